//! HTML to Markdown conversion.
//!
//! The surface's HTML is parsed with `html_parser` and the resulting tree is
//! written back out as Markdown using the same dialect `markdown_to_html`
//! reads: GFM code fences, strikethrough, task lists and sized images.

use std::sync::LazyLock;

use html_parser::{Dom, Element, Node};
use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

/// Characters that are Markdown syntax wherever they appear in text.
static INLINE_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\\`*_~|<]").expect("inline syntax pattern"));

/// `&name;` would be read back as an entity.
static ENTITY_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#?[0-9A-Za-z]+;)").expect("entity pattern"));

/// `](` in text would open a link.
static LINK_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\](\s*)\(").expect("link opener pattern"));

/// Heading, quote, bullet and setext markers at the start of a line.
static LEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( {0,3})([#>+=-])").expect("leading marker pattern"));

/// Ordered list markers at the start of a line.
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( {0,3}\d+)([.)])").expect("leading number pattern"));

/// Link reference definitions at the start of a line.
static LEADING_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( {0,3})\[([^\]]*)\]:").expect("leading reference pattern")
});

/// Elements that always start a new block.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "div", "dl", "figure", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "html", "li", "main", "nav", "ol",
    "p", "pre", "section", "table", "ul",
];

/// Convert HTML produced by the editing surface into Markdown.
///
/// Unparseable input degrades to its text content.
pub fn html_to_markdown(html: &str) -> String {
    let dom = match Dom::parse(html) {
        Ok(dom) => dom,
        Err(err) => {
            tracing::warn!(%err, "html parse failed, falling back to text content");
            return fallback_text(html);
        }
    };

    let mut blocks = Vec::new();
    write_blocks(&dom.children, &mut blocks);
    blocks.join("\n\n")
}

fn fallback_text(html: &str) -> String {
    let stripped = ANY_TAG.replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    WHITESPACE_RUN.replace_all(decoded.trim(), " ").into_owned()
}

fn is_block(node: &Node) -> bool {
    match node {
        Node::Element(el) => BLOCK_ELEMENTS.contains(&el.name.to_ascii_lowercase().as_str()),
        _ => false,
    }
}

/// Write a run of sibling nodes as Markdown blocks.
///
/// Consecutive inline nodes are gathered into a single paragraph.
fn write_blocks(nodes: &[Node], blocks: &mut Vec<String>) {
    let mut pending_inline: Vec<&Node> = Vec::new();
    for node in nodes {
        if is_block(node) {
            flush_paragraph(&mut pending_inline, blocks);
            if let Node::Element(el) = node {
                write_block_element(el, blocks);
            }
        } else {
            pending_inline.push(node);
        }
    }
    flush_paragraph(&mut pending_inline, blocks);
}

fn flush_paragraph(pending: &mut Vec<&Node>, blocks: &mut Vec<String>) {
    if pending.is_empty() {
        return;
    }
    let mut text = String::new();
    for node in pending.drain(..) {
        write_inline(node, &mut text);
    }
    push_block(blocks, finish_inline(&text));
}

fn push_block(blocks: &mut Vec<String>, block: String) {
    if !block.trim().is_empty() {
        blocks.push(block);
    }
}

fn write_block_element(el: &Element, blocks: &mut Vec<String>) {
    let name = el.name.to_ascii_lowercase();
    match name.as_str() {
        "p" => push_block(blocks, inline_children(el)),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = usize::from(name.as_bytes()[1] - b'0');
            let text = inline_children(el);
            if !text.is_empty() {
                blocks.push(format!("{} {text}", "#".repeat(level)));
            }
        }
        "ul" => push_block(blocks, list(el, false, 0)),
        "ol" => push_block(blocks, list(el, true, 0)),
        "blockquote" => {
            let mut inner = Vec::new();
            write_blocks(&el.children, &mut inner);
            push_block(blocks, quote(&inner.join("\n\n")));
        }
        "pre" => blocks.push(code_fence(el)),
        "hr" => blocks.push("---".to_string()),
        "table" => push_block(blocks, table(el)),
        // Containers (div, section, li outside a list, ...) contribute their children.
        _ => write_blocks(&el.children, blocks),
    }
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn code_fence(pre: &Element) -> String {
    let code = pre.children.iter().find_map(|child| match child {
        Node::Element(el) if el.name.eq_ignore_ascii_case("code") => Some(el),
        _ => None,
    });
    let language = code
        .and_then(|el| {
            el.classes
                .iter()
                .find_map(|class| class.strip_prefix("language-"))
        })
        .unwrap_or_default();
    let mut body = String::new();
    raw_text(code.map_or(&pre.children, |el| &el.children), &mut body);
    let body = html_escape::decode_html_entities(&body);
    format!("```{language}\n{}\n```", body.trim_end_matches('\n'))
}

fn raw_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name.eq_ignore_ascii_case("br") => out.push('\n'),
            Node::Element(el) => raw_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

fn list(el: &Element, ordered: bool, indent: usize) -> String {
    let mut number = el
        .attributes
        .get("start")
        .and_then(|v| v.as_deref())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1);
    let pad = " ".repeat(indent);
    let mut lines = Vec::new();

    for item in el.children.iter().filter_map(|child| match child {
        Node::Element(li) if li.name.eq_ignore_ascii_case("li") => Some(li),
        _ => None,
    }) {
        let marker = if ordered {
            let marker = format!("{number}. ");
            number += 1;
            marker
        } else {
            "- ".to_string()
        };
        let child_indent = indent + marker.len();

        let mut text = String::new();
        let mut nested = Vec::new();
        for child in &item.children {
            match child {
                Node::Element(sub) if sub.name.eq_ignore_ascii_case("ul") => {
                    nested.push(list(sub, false, child_indent));
                }
                Node::Element(sub) if sub.name.eq_ignore_ascii_case("ol") => {
                    nested.push(list(sub, true, child_indent));
                }
                Node::Element(sub) if sub.name.eq_ignore_ascii_case("p") => {
                    if !text.trim().is_empty() {
                        text.push(' ');
                    }
                    for node in &sub.children {
                        write_inline(node, &mut text);
                    }
                }
                other => write_inline(other, &mut text),
            }
        }

        let child_pad = " ".repeat(child_indent);
        let body = finish_inline(&text).replace('\n', &format!("\n{child_pad}"));
        lines.push(format!("{pad}{marker}{body}"));
        lines.extend(nested);
    }
    lines.join("\n")
}

fn table(el: &Element) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    collect_rows(&el.children, &mut rows);
    let Some(columns) = rows.iter().map(Vec::len).max() else {
        return String::new();
    };

    let mut lines = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let mut cells = row.clone();
        cells.resize(columns, String::new());
        lines.push(format!("| {} |", cells.join(" | ")));
        if idx == 0 {
            lines.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    lines.join("\n")
}

fn collect_rows(nodes: &[Node], rows: &mut Vec<Vec<String>>) {
    for node in nodes {
        let Node::Element(el) = node else {
            continue;
        };
        if el.name.eq_ignore_ascii_case("tr") {
            let cells = el
                .children
                .iter()
                .filter_map(|cell| match cell {
                    Node::Element(c)
                        if c.name.eq_ignore_ascii_case("td") || c.name.eq_ignore_ascii_case("th") =>
                    {
                        Some(escape_cell_pipes(&inline_children(c)))
                    }
                    _ => None,
                })
                .collect();
            rows.push(cells);
        } else {
            collect_rows(&el.children, rows);
        }
    }
}

fn inline_children(el: &Element) -> String {
    let mut text = String::new();
    for node in &el.children {
        write_inline(node, &mut text);
    }
    finish_inline(&text)
}

/// Tidy an inline run: no spaces around hard breaks, no outer whitespace.
fn finish_inline(text: &str) -> String {
    text.split("  \n")
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("  \n")
        .trim()
        .to_string()
}

fn write_inline(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => {
            let decoded = html_escape::decode_html_entities(text);
            let collapsed = WHITESPACE_RUN.replace_all(&decoded, " ");
            let line_start = out.is_empty() || out.ends_with('\n');
            let piece: &str = if line_start || out.ends_with(' ') {
                collapsed.trim_start()
            } else {
                &collapsed
            };
            out.push_str(&escape_text(piece, line_start));
        }
        Node::Element(el) => write_inline_element(el, out),
        Node::Comment(_) => {}
    }
}

/// Backslash-escape text so it reads back as the same literal text.
fn escape_text(text: &str, line_start: bool) -> String {
    let text = INLINE_SYNTAX.replace_all(text, r"\$0");
    let text = ENTITY_LIKE.replace_all(&text, r"\&$1");
    let mut text = LINK_OPENER
        .replace_all(&text, r"\]${1}\(")
        .into_owned();
    if line_start {
        text = LEADING_MARKER.replace(&text, r"${1}\${2}").into_owned();
        text = LEADING_NUMBER.replace(&text, r"${1}\${2}").into_owned();
        text = LEADING_REFERENCE.replace(&text, r"${1}\[${2}]:").into_owned();
    }
    text
}

/// Escape pipes in a table cell unless already escaped.
fn escape_cell_pipes(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut escaped = false;
    for ch in cell.chars() {
        if ch == '|' && !escaped {
            out.push('\\');
        }
        escaped = ch == '\\' && !escaped;
        out.push(ch);
    }
    out
}

fn write_inline_element(el: &Element, out: &mut String) {
    let name = el.name.to_ascii_lowercase();
    match name.as_str() {
        "strong" | "b" => wrap_inline(el, "**", out),
        "em" | "i" => wrap_inline(el, "*", out),
        "del" | "s" | "strike" => wrap_inline(el, "~~", out),
        "code" => {
            let mut code = String::new();
            raw_text(&el.children, &mut code);
            out.push('`');
            out.push_str(&html_escape::decode_html_entities(&code));
            out.push('`');
        }
        "br" => {
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
            out.push_str("  \n");
        }
        "a" => {
            let label = inline_children(el);
            match attribute(el, "href") {
                Some(href) => {
                    out.push_str(&format!("[{label}]({href}"));
                    if let Some(title) = attribute(el, "title") {
                        out.push_str(&format!(" \"{title}\""));
                    }
                    out.push(')');
                }
                None => out.push_str(&label),
            }
        }
        "img" => out.push_str(&image(el)),
        "input" => {
            if attribute(el, "type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox")) {
                out.push_str(if el.attributes.contains_key("checked") {
                    "[x]"
                } else {
                    "[ ]"
                });
            }
        }
        "u" | "sub" | "sup" | "mark" => {
            out.push_str(&format!("<{name}>{}</{name}>", inline_children(el)));
        }
        _ => {
            for child in &el.children {
                write_inline(child, out);
            }
        }
    }
}

fn wrap_inline(el: &Element, delimiter: &str, out: &mut String) {
    let inner = inline_children(el);
    if inner.is_empty() {
        return;
    }
    out.push_str(delimiter);
    out.push_str(&inner);
    out.push_str(delimiter);
}

fn image(el: &Element) -> String {
    let src = attribute(el, "src").unwrap_or_default();
    let alt = attribute(el, "alt").unwrap_or_default();
    let width = attribute(el, "width");
    let height = attribute(el, "height");
    if width.is_none() && height.is_none() {
        return format!("![{alt}]({src})");
    }
    format!(
        "![{alt}]({src} ={}x{})",
        width.unwrap_or("*"),
        height.unwrap_or("*")
    )
}

fn attribute<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attributes
        .get(name)
        .and_then(|value| value.as_deref())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        let md = html_to_markdown("<p>one</p><p>two</p>");
        assert_eq!(md, "one\n\ntwo");
    }

    #[test]
    fn test_headings() {
        let md = html_to_markdown("<h1>Top</h1><h3>Deep</h3>");
        assert_eq!(md, "# Top\n\n### Deep");
    }

    #[test]
    fn test_inline_emphasis() {
        let md =
            html_to_markdown("<p>a <strong>b</strong> and <em>c</em> or <del>d</del></p>");
        assert_eq!(md, "a **b** and *c* or ~~d~~");
    }

    #[test]
    fn test_inline_code_keeps_content() {
        let md = html_to_markdown("<p>run <code>cargo &amp;&amp; go</code></p>");
        assert_eq!(md, "run `cargo && go`");
    }

    #[test]
    fn test_link_with_title() {
        let md = html_to_markdown("<p><a href=\"http://x\" title=\"X\">x</a></p>");
        assert_eq!(md, "[x](http://x \"X\")");
    }

    #[test]
    fn test_unordered_and_ordered_lists() {
        let md = html_to_markdown("<ul><li>a</li><li>b</li></ul><ol start=\"3\"><li>c</li><li>d</li></ol>");
        assert_eq!(md, "- a\n- b\n\n3. c\n4. d");
    }

    #[test]
    fn test_nested_list_is_indented() {
        let md = html_to_markdown("<ul><li>a<ul><li>b</li></ul></li></ul>");
        assert_eq!(md, "- a\n  - b");
    }

    #[test]
    fn test_task_list_items() {
        let md = html_to_markdown(
            "<ul><li><input type=\"checkbox\" checked=\"\" disabled=\"\" /> done</li>\
             <li><input type=\"checkbox\" disabled=\"\" /> todo</li></ul>",
        );
        assert_eq!(md, "- [x] done\n- [ ] todo");
    }

    #[test]
    fn test_bare_checkbox_outside_list() {
        let md = html_to_markdown("<p><input type=\"checkbox\" checked=\"\"> done</p>");
        assert_eq!(md, "[x] done");
    }

    #[test]
    fn test_code_block_with_language() {
        let md = html_to_markdown("<pre><code class=\"language-rust\">fn main() {}\n</code></pre>");
        assert_eq!(md, "```rust\nfn main() {}\n```");
    }

    #[test]
    fn test_blockquote() {
        let md = html_to_markdown("<blockquote><p>one</p><p>two</p></blockquote>");
        assert_eq!(md, "> one\n>\n> two");
    }

    #[test]
    fn test_image_with_width() {
        let md = html_to_markdown("<img src=\"http://x/y.png\" width=\"900\">");
        assert_eq!(md, "![](http://x/y.png =900x*)");
    }

    #[test]
    fn test_image_without_dimensions() {
        let md = html_to_markdown("<p><img src=\"http://x/y.png\" alt=\"pic\"></p>");
        assert_eq!(md, "![pic](http://x/y.png)");
    }

    #[test]
    fn test_line_break() {
        let md = html_to_markdown("<p>one<br>two</p>");
        assert_eq!(md, "one  \ntwo");
    }

    #[test]
    fn test_table() {
        let md = html_to_markdown(
            "<table><thead><tr><th>a</th><th>b</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr></tbody></table>",
        );
        assert_eq!(md, "| a | b |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn test_comments_are_dropped() {
        let md = html_to_markdown("<p>keep</p><!-- note --><p>this</p>");
        assert_eq!(md, "keep\n\nthis");
    }

    #[test]
    fn test_entities_are_decoded() {
        let md = html_to_markdown("<p>fish &amp; chips</p>");
        assert_eq!(md, "fish & chips");
    }

    #[test]
    fn test_inline_syntax_in_text_is_escaped() {
        let md = html_to_markdown("<p>*starred* snake_case a|b `tick` ~x~</p>");
        assert_eq!(md, r"\*starred\* snake\_case a\|b \`tick\` \~x\~");
    }

    #[test]
    fn test_line_start_markers_are_escaped() {
        assert_eq!(html_to_markdown("<p># 1 priority</p>"), r"\# 1 priority");
        assert_eq!(html_to_markdown("<p>3. not a list</p>"), r"3\. not a list");
        assert_eq!(html_to_markdown("<p>- dash</p>"), r"\- dash");
        assert_eq!(html_to_markdown("<p>&gt; aside</p>"), r"\> aside");
        assert_eq!(html_to_markdown("<p>[a]: b</p>"), r"\[a]: b");
    }

    #[test]
    fn test_markers_mid_line_are_left_alone() {
        let md = html_to_markdown("<p>well-known # 2. place &gt; all</p>");
        assert_eq!(md, "well-known # 2. place > all");
    }

    #[test]
    fn test_text_link_opener_is_escaped() {
        let md = html_to_markdown("<p>see [1] (below)</p>");
        assert_eq!(md, r"see [1\] \(below)");
    }

    #[test]
    fn test_entity_lookalike_is_escaped() {
        let md = html_to_markdown("<p>&amp;copy; stays</p>");
        assert_eq!(md, r"\&copy; stays");
    }

    #[test]
    fn test_table_cell_pipe_is_escaped_once() {
        let md = html_to_markdown("<table><tr><td>a|b</td></tr></table>");
        assert_eq!(md, "| a\\|b |\n| --- |");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(html_to_markdown(""), "");
    }

    #[test]
    fn test_fallback_text_strips_tags() {
        assert_eq!(fallback_text("<p>a &amp; <b>b</b></p>"), "a & b");
    }
}
