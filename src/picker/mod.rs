//! Image picker dialog state.
//!
//! The dialog lists a record's attachments by filename and hands back the
//! chosen one as an opaque `"<id> <url>"` token.

use crate::host::Attachment;

/// One entry in the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOption {
    /// Shown to the user.
    pub label: String,
    /// Returned on confirmation.
    pub token: String,
}

/// A parsed picker token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageToken<'a> {
    pub attachment_id: &'a str,
    pub url: &'a str,
}

impl<'a> ImageToken<'a> {
    /// Split a token produced by [`encode_token`].
    pub fn parse(token: &'a str) -> Option<Self> {
        let (attachment_id, url) = token.split_once(' ')?;
        if attachment_id.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self { attachment_id, url })
    }
}

pub fn encode_token(attachment: &Attachment) -> String {
    format!("{} {}", attachment.id, attachment.url)
}

/// State of an open image picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePicker {
    options: Vec<ImageOption>,
    selected: Option<String>,
}

impl ImagePicker {
    /// Build the picker for a record's attachments.
    ///
    /// Options are sorted by filename, ignoring case; the first one starts selected.
    pub fn new(mut attachments: Vec<Attachment>) -> Self {
        attachments.sort_by_cached_key(|a| a.filename.to_uppercase());
        let options: Vec<ImageOption> = attachments
            .iter()
            .map(|a| ImageOption {
                label: a.filename.clone(),
                token: encode_token(a),
            })
            .collect();
        let selected = options.first().map(|o| o.token.clone());
        Self { options, selected }
    }

    pub fn options(&self) -> &[ImageOption] {
        &self.options
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select the option carrying `token`. Unknown tokens are ignored.
    pub fn select(&mut self, token: &str) -> bool {
        if self.options.iter().any(|o| o.token == token) {
            self.selected = Some(token.to_string());
            true
        } else {
            false
        }
    }

    /// Select the option whose label matches `filename`, ignoring case.
    pub fn select_by_label(&mut self, filename: &str) -> bool {
        let Some(token) = self
            .options
            .iter()
            .find(|o| o.label.eq_ignore_ascii_case(filename))
            .map(|o| o.token.clone())
        else {
            return false;
        };
        self.selected = Some(token);
        true
    }

    /// Close the dialog with the current choice.
    pub fn confirm(self) -> Option<String> {
        self.selected
    }
}
