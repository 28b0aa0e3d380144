//! Interfaces the editing core consumes from its host.
//!
//! The core never talks to a concrete platform. The host hands it:
//! - a [`RecordStore`] for reading and writing the backing record
//! - a [`SurfaceMount`] that creates the rich-text [`EditorSurface`]
//! - a [`ScriptLoader`] that fetches the surface's engine script once
//!
//! and forwards surface callbacks and cursor changes as
//! [`Message`](crate::session::Message)s.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::LoadCompletion;

/// Identifier of a table in the host's base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub String);

/// Identifier of a record within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record together with the table it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub table: TableId,
    pub record: RecordId,
}

impl RecordRef {
    pub fn new(table: impl Into<String>, record: impl Into<String>) -> Self {
        Self {
            table: TableId(table.into()),
            record: RecordId(record.into()),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.record)
    }
}

/// One file in a record's attachment field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
}

/// Errors reported by a [`RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table {0} not found")]
    UnknownTable(TableId),
    #[error("record {0} not found")]
    UnknownRecord(RecordRef),
    #[error("field {field} of {record} does not hold {expected}")]
    FieldType {
        record: RecordRef,
        field: String,
        expected: &'static str,
    },
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read/write access to the backing records.
pub trait RecordStore {
    /// Current value of a text field, `None` when the cell is empty.
    ///
    /// # Errors
    /// Returns an error if the record cannot be read.
    fn get_field(&self, record: &RecordRef, field: &str) -> Result<Option<String>, StoreError>;

    /// Replace a text field with `markdown`.
    ///
    /// # Errors
    /// Returns an error if the write is rejected or cannot be stored.
    fn update_field(
        &mut self,
        record: &RecordRef,
        field: &str,
        markdown: &str,
    ) -> Result<(), StoreError>;

    /// Files in an attachment field, in storage order.
    ///
    /// # Errors
    /// Returns an error if the record cannot be read.
    fn attachments(&self, record: &RecordRef, field: &str) -> Result<Vec<Attachment>, StoreError>;

    /// Turn an attachment's stored URL into one the surface can display.
    fn attachment_display_url(&self, record: &RecordRef, attachment_id: &str, url: &str)
    -> String;
}

/// A mounted rich-text editing surface.
pub trait EditorSurface {
    /// The surface's current HTML.
    fn content(&self) -> String;

    /// Replace the surface's HTML.
    fn set_content(&mut self, html: &str);
}

/// Creates editing surfaces once the engine script is available.
pub trait SurfaceMount {
    /// Mount a surface and return the handle the session keeps for its lifetime.
    fn mount(&mut self, init: SurfaceInit) -> Box<dyn EditorSurface>;
}

/// Fetches the surface engine's script.
pub trait ScriptLoader {
    /// Start loading `url`; call [`LoadCompletion::complete`] when it is available.
    ///
    /// A load that never completes leaves every session on its loading placeholder.
    fn begin_load(&self, url: &str, done: LoadCompletion);
}

/// A host whose surface needs no external script.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateLoader;

impl ScriptLoader for ImmediateLoader {
    fn begin_load(&self, url: &str, done: LoadCompletion) {
        tracing::debug!(url, "no script to fetch, completing load");
        done.complete();
    }
}

/// The host's current table and record selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorSelection {
    pub table: Option<TableId>,
    pub records: Vec<RecordId>,
}

impl CursorSelection {
    pub fn new(table: impl Into<String>, records: &[&str]) -> Self {
        Self {
            table: Some(TableId(table.into())),
            records: records.iter().map(|r| RecordId((*r).to_string())).collect(),
        }
    }

    /// The record the editor should follow: the first selected one.
    pub fn active_record(&self) -> Option<RecordRef> {
        Some(RecordRef {
            table: self.table.clone()?,
            record: self.records.first()?.clone(),
        })
    }
}

/// Name of the toolbar button that opens the image picker.
pub const IMAGE_BUTTON: &str = "customImageButton";

const TOOLBAR: &str = "read | undo redo | removeformat | h1 h2 h3 | bold italic underline | \
                       customImageButton link blockquote | bullist numlist | codesample | \
                       fullscreen print help";

const PLUGINS: &str = "advlist anchor autolink codesample emoticons fullscreen help link lists \
                       paste print quickbars searchreplace table textpattern visualblocks";

/// A custom toolbar button registered through the surface's plugin hook.
///
/// Pressing it must be forwarded as [`Message::ImageInsertRequested`](crate::session::Message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarButton {
    pub name: &'static str,
    pub icon: &'static str,
    pub tooltip: &'static str,
}

/// Everything a host needs to mount the editing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInit {
    /// Rendered document to seed the surface with.
    pub html: String,
    pub toolbar: &'static str,
    pub plugins: &'static str,
    pub buttons: Vec<ToolbarButton>,
    pub menubar: bool,
    pub statusbar: bool,
    pub default_link_target: &'static str,
    pub valid_elements: &'static str,
    pub entity_encoding: &'static str,
}

impl SurfaceInit {
    pub fn new(html: String) -> Self {
        Self {
            html,
            toolbar: TOOLBAR,
            plugins: PLUGINS,
            buttons: vec![ToolbarButton {
                name: IMAGE_BUTTON,
                icon: "image",
                tooltip: "Add Image",
            }],
            menubar: false,
            statusbar: false,
            default_link_target: "_blank",
            valid_elements: "*[*]",
            entity_encoding: "raw",
        }
    }
}
