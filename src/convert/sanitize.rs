//! Markdown cleanup applied after every HTML -> Markdown conversion.

use std::sync::LazyLock;

use regex::Regex;

/// Empty comment the converter leaves between adjacent lists.
const EMPTY_COMMENT: &str = "<!-- -->";

/// A `[ ]` or `[x]` marker opening a line that is not already a list item.
static BARE_TASK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)\[( |x)\]").expect("task marker pattern"));

/// Clean up Markdown produced from the surface's HTML.
///
/// Rules, applied in order:
/// 1. drop empty `<!-- -->` comment markers
/// 2. drop whitespace at the end of the document
/// 3. put a space after `](` in link and image syntax
/// 4. turn bare `[ ]` / `[x]` markers at the start of a line into `- [ ]` / `- [x]`
///
/// The result is a fixed point: sanitizing it again changes nothing. Empty
/// input is returned as is; an absent field maps through `Option::map`.
///
/// # Example
///
/// ```
/// use richnote::convert::sanitize;
///
/// assert_eq!(sanitize("[x] done\n[ ] todo"), "- [x] done\n- [ ] todo");
/// ```
pub fn sanitize(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }

    let mut sanitized = markdown.to_string();
    // Removing one marker can splice a new one together.
    while sanitized.contains(EMPTY_COMMENT) {
        sanitized = sanitized.replace(EMPTY_COMMENT, "");
    }

    sanitized.truncate(sanitized.trim_end().len());

    sanitized = sanitized.replace("](", "] (");

    BARE_TASK_MARKER
        .replace_all(&sanitized, "${1}- [$2]")
        .into_owned()
}
