//! Markdown to HTML rendering with comrak.

use std::sync::LazyLock;

use comrak::{Options, markdown_to_html as comrak_to_html};
use regex::{Captures, Regex};

/// `![alt](url =WxH)` where either dimension may be `*`.
static SIZED_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]\n]*)\]\(\s*<?([^\s<>()]+)>?\s+=(\d+|\*)x(\d+|\*)\s*\)")
        .expect("sized image pattern")
});

/// Render Markdown into HTML for the editing surface.
///
/// Besides `CommonMark` and the GFM extensions, this understands the
/// `![alt](url =WxH)` image dimension syntax and link syntax with a space
/// between `]` and `(`.
///
/// # Example
///
/// ```
/// use richnote::convert::markdown_to_html;
///
/// let html = markdown_to_html("~~old~~ new");
/// assert!(html.contains("<del>old</del>"));
/// ```
pub fn markdown_to_html(markdown: &str) -> String {
    let source = expand_sized_images(&join_spaced_links(markdown));
    comrak_to_html(&source, &create_options())
}

fn create_options() -> Options {
    let mut options = Options::default();

    // Enable GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;

    // Sized images and inserted attachments are raw <img> tags.
    options.render.unsafe_ = true;

    options
}

/// Undo the sanitizer's `] (` spacing outside code. An escaped `\]` is text.
fn join_spaced_links(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut fence: Option<(char, usize)> = None;
    for line in markdown.split_inclusive('\n') {
        match (fence, fence_of(line)) {
            (Some((ch, len)), Some((close, run)))
                if close == ch && run >= len && line.trim().chars().all(|c| c == ch) =>
            {
                fence = None;
                out.push_str(line);
            }
            (Some(_), _) => out.push_str(line),
            (None, Some(open)) => {
                fence = Some(open);
                out.push_str(line);
            }
            (None, None) => join_outside_code_spans(line, &mut out),
        }
    }
    out
}

/// Fence character and run length when `line` opens or closes a code fence.
fn fence_of(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = trimmed.chars().take_while(|c| *c == ch).count();
    (run >= 3).then_some((ch, run))
}

fn join_outside_code_spans(line: &str, out: &mut String) {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut escaped = false;
    while i < bytes.len() {
        if bytes[i] == b'`' && !escaped {
            let run = backtick_run(&bytes[i..]);
            let end = closing_backticks(bytes, i + run, run).unwrap_or(i + run);
            out.push_str(&line[i..end]);
            i = end;
            continue;
        }
        if bytes[i] == b']' && !escaped && bytes[i + 1..].starts_with(b" (") {
            out.push_str("](");
            i += 3;
            continue;
        }
        let Some(ch) = line[i..].chars().next() else {
            break;
        };
        escaped = ch == '\\' && !escaped;
        out.push(ch);
        i += ch.len_utf8();
    }
}

fn backtick_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| **b == b'`').count()
}

/// End of the first backtick run of exactly `run` ticks at or after `from`.
fn closing_backticks(bytes: &[u8], from: usize, run: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b'`' {
            let len = backtick_run(&bytes[j..]);
            if len == run {
                return Some(j + len);
            }
            j += len;
        } else {
            j += 1;
        }
    }
    None
}

fn expand_sized_images(markdown: &str) -> String {
    SIZED_IMAGE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let alt = html_escape::encode_double_quoted_attribute(&caps[1]);
            let src = html_escape::encode_double_quoted_attribute(&caps[2]);
            let mut tag = format!("<img src=\"{src}\" alt=\"{alt}\"");
            if &caps[3] != "*" {
                tag.push_str(&format!(" width=\"{}\"", &caps[3]));
            }
            if &caps[4] != "*" {
                tag.push_str(&format!(" height=\"{}\"", &caps[4]));
            }
            tag.push('>');
            tag
        })
        .into_owned()
}
