// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. session::SessionError)
    clippy::module_name_repetitions
)]

//! # Richnote
//!
//! A rich-text notes editor core that keeps Markdown as the stored form.
//!
//! Richnote edits a Markdown field of a record through an HTML editing surface:
//! - Markdown is rendered to HTML to seed the surface
//! - every edit is converted back, sanitized, and saved after a quiet period
//! - the surface's engine script is loaded once per process, however many
//!   editors are open
//!
//! ## Architecture
//!
//! Richnote uses The Elm Architecture (TEA) pattern:
//! - **Model**: [`session::EditorSession`] state
//! - **Message**: [`session::Message`] events from the host
//! - **Update**: [`session::EditorSession::handle`]
//! - **View**: [`session::View`], what the host should render
//!
//! ## Modules
//!
//! - [`convert`]: Markdown/HTML conversion and sanitizing
//! - [`gate`]: Process-wide script load gate
//! - [`debounce`]: Trailing-edge write debouncer
//! - [`session`]: Per-record editing controller
//! - [`picker`]: Image picker dialog state
//! - [`host`]: Traits and types the embedding host provides
//! - [`store`]: Memory and JSON-file record stores
//! - [`surface`]: HTML-file editing surface and its watcher
//! - [`config`]: Settings and saved defaults
//! - [`console`]: Interactive commands for the CLI editor

pub mod config;
pub mod console;
pub mod convert;
pub mod debounce;
pub mod gate;
pub mod host;
pub mod picker;
pub mod session;
pub mod store;
pub mod surface;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::convert::Converter;
    pub use crate::gate::{LoadState, ScriptLoadGate};
    pub use crate::host::{CursorSelection, RecordRef, RecordStore};
    pub use crate::session::{Collaborators, EditorSession, Message, View};
}
