use crate::host::{RecordRef, RecordStore};
use crate::picker::ImagePicker;

use super::EditorSession;

/// Text shown when the host has no active record.
pub const NOTHING_SELECTED: &str = "Pick a record :)";

/// What the host should render for a session.
#[derive(Debug, PartialEq, Eq)]
pub enum View<'a> {
    /// Neutral prompt; there is no record to edit.
    NothingSelected,
    /// Full-viewport blocking placeholder while the engine script loads.
    Loading,
    /// The editor with its controls.
    Editor(EditorView<'a>),
}

/// Controls around a mounted surface.
#[derive(Debug, PartialEq, Eq)]
pub struct EditorView<'a> {
    pub record: &'a RecordRef,
    /// State of the "Lock editor" switch.
    pub locked: bool,
    /// Whether the surface has reported that it finished initializing.
    pub initialized: bool,
    /// Open image picker dialog; editing is suspended while present.
    pub picker: Option<&'a ImagePicker>,
    /// Whether a debounced save is waiting.
    pub save_pending: bool,
}

impl<S: RecordStore> EditorSession<S> {
    pub fn view(&self) -> View<'_> {
        let Some(record) = self.target.as_ref() else {
            return View::NothingSelected;
        };
        if self.surface.is_none() {
            return View::Loading;
        }
        View::Editor(EditorView {
            record,
            locked: self.locked,
            initialized: self.load_state == crate::gate::LoadState::Initialized,
            picker: self.picker.as_ref(),
            save_pending: self.writes.is_pending(),
        })
    }
}
