//! Markdown <-> HTML conversion for the editing surface.
//!
//! This module handles:
//! - Rendering stored Markdown into HTML with comrak
//! - Turning edited HTML back into Markdown
//! - Sanitizing Markdown to undo known round-trip artifacts
//!
//! All functions here are pure. None of them fail: malformed input is passed
//! through on a best-effort basis.

mod html;
mod markdown;
mod sanitize;

pub use html::markdown_to_html;
pub use markdown::html_to_markdown;
pub use sanitize::sanitize;

/// Text shown in the surface when the field has no content yet.
pub const DEFAULT_PLACEHOLDER: &str = "Add some notes :)";

/// Converts between the stored Markdown and the surface's HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converter {
    placeholder: String,
}

impl Converter {
    /// Create a converter that renders `placeholder` for empty fields.
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    /// The prompt rendered when the field is empty.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Render Markdown into HTML.
    ///
    /// A missing or empty field renders the placeholder prompt instead.
    pub fn to_html(&self, markdown: Option<&str>) -> String {
        match markdown {
            Some(md) if !md.is_empty() => markdown_to_html(md),
            _ => markdown_to_html(&self.placeholder),
        }
    }

    /// Convert surface HTML back into Markdown.
    #[allow(clippy::unused_self)]
    pub fn to_markdown(&self, html: &str) -> String {
        html_to_markdown(html)
    }

    /// Convert surface HTML into the Markdown that gets persisted.
    pub fn to_stored_markdown(&self, html: &str) -> String {
        sanitize(&self.to_markdown(html))
    }

    /// Render a stored field value for display, sanitizing it first.
    pub fn render_field(&self, stored: Option<&str>) -> String {
        let sanitized = stored.map(sanitize);
        self.to_html(sanitized.as_deref())
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER)
    }
}
