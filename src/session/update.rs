use crate::gate::LoadState;
use crate::host::{CursorSelection, RecordRef, RecordStore};
use crate::picker::{ImagePicker, ImageToken};

use super::{EditorSession, SessionError};

/// Events a host forwards to an editor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Script and surface lifecycle
    /// The shared script gate changed state
    ScriptLoadChanged,
    /// The mounted surface finished initializing
    SurfaceInitialized,
    /// The surface's content changed to this HTML
    ContentChanged(String),

    // User actions
    /// Save button pressed
    SaveRequested,
    /// Lock switch toggled
    LockChanged(bool),
    /// Image toolbar button pressed
    ImageInsertRequested,
    /// A different option was chosen in the image picker
    ImageSelected(String),
    /// Image picker confirmed, with the chosen token when the host tracks it
    ImageConfirmed(Option<String>),
    /// Image picker dismissed
    ImageCanceled,

    // Host
    /// The host's table/record selection changed
    CursorChanged(CursorSelection),
}

impl<S: RecordStore> EditorSession<S> {
    /// Apply one host event at time `now_ms`.
    ///
    /// # Errors
    /// Returns an error when a save or a load against the store fails, or when
    /// a confirmed image choice cannot be parsed. The session stays usable.
    pub fn handle(&mut self, msg: Message, now_ms: u64) -> Result<(), SessionError> {
        match msg {
            Message::LockChanged(locked) => {
                self.locked = locked;
                Ok(())
            }
            Message::CursorChanged(cursor) => self.follow_cursor(&cursor),
            // Nothing selected: no gating, conversion or persistence.
            _ if self.target.is_none() => Ok(()),
            Message::ScriptLoadChanged => self.sync_load_state(),
            Message::SurfaceInitialized => {
                if self.surface.is_some() {
                    self.load_state = LoadState::Initialized;
                    self.gate.mark_initialized();
                }
                Ok(())
            }
            Message::ContentChanged(html) => {
                self.content_changed(html, now_ms);
                Ok(())
            }
            Message::SaveRequested => self.save_now(),
            Message::ImageInsertRequested => self.open_picker(),
            Message::ImageSelected(token) => {
                if let Some(picker) = self.picker.as_mut() {
                    picker.select(&token);
                }
                Ok(())
            }
            Message::ImageConfirmed(token) => self.insert_image(token, now_ms),
            Message::ImageCanceled => {
                self.picker = None;
                Ok(())
            }
        }
    }

    fn content_changed(&mut self, html: String, now_ms: u64) {
        if self.surface.is_none() {
            return;
        }
        if self.picker.is_some() {
            tracing::debug!("edit ignored while the image picker is open");
            return;
        }
        // A surface reporting back what the session wrote is not an edit.
        if self.written.as_deref() == Some(html.as_str()) {
            tracing::trace!("surface echoed its own content");
            return;
        }
        self.written = None;
        self.apply_surface_html(&html, now_ms);
    }

    /// Read the live surface and write it straight through.
    fn save_now(&mut self) -> Result<(), SessionError> {
        if self.picker.is_some() {
            tracing::debug!("save ignored while the image picker is open");
            return Ok(());
        }
        let (Some(surface), Some(record)) = (self.surface.as_ref(), self.target.clone()) else {
            return Ok(());
        };
        let markdown = self.converter.to_stored_markdown(&surface.content());
        self.writes.cancel();
        self.draft = Some(markdown.clone());
        self.persist(super::PendingWrite { record, markdown })
    }

    fn follow_cursor(&mut self, cursor: &CursorSelection) -> Result<(), SessionError> {
        if self.locked {
            tracing::debug!("editor locked, ignoring selection change");
            return Ok(());
        }
        let Some(next) = cursor.active_record() else {
            return Ok(());
        };
        if self.target.as_ref() == Some(&next) {
            return Ok(());
        }
        self.switch_to(next)
    }

    /// Move to another record, landing any pending write on the old one first.
    fn switch_to(&mut self, next: RecordRef) -> Result<(), SessionError> {
        tracing::debug!(record = %next, "switching record");
        let flushed = self.flush();

        self.target = Some(next);
        self.surface = None;
        self.written = None;
        self.draft = None;
        self.picker = None;
        if self.load_state > LoadState::Loaded {
            self.load_state = LoadState::Loaded;
        }
        self.sync_load_state()?;

        flushed.map(|_| ())
    }

    fn open_picker(&mut self) -> Result<(), SessionError> {
        if self.picker.is_some() || self.surface.is_none() {
            return Ok(());
        }
        let Some(record) = self.target.clone() else {
            return Ok(());
        };
        let attachments = self
            .store
            .attachments(&record, &self.config.attachment_field)
            .map_err(|source| SessionError::Load { record, source })?;
        self.picker = Some(ImagePicker::new(attachments));
        Ok(())
    }

    fn insert_image(&mut self, token: Option<String>, now_ms: u64) -> Result<(), SessionError> {
        let Some(picker) = self.picker.take() else {
            return Ok(());
        };
        let Some(token) = token.or_else(|| picker.confirm()) else {
            return Ok(());
        };
        let Some(parsed) = ImageToken::parse(&token) else {
            tracing::warn!(%token, "unparseable image choice");
            return Err(SessionError::InvalidImageToken(token));
        };
        let (Some(record), Some(surface)) = (self.target.as_ref(), self.surface.as_mut()) else {
            return Ok(());
        };

        let url = self
            .store
            .attachment_display_url(record, parsed.attachment_id, parsed.url);
        let img = format!(
            "<img src=\"{}\" width=\"{}\">",
            html_escape::encode_double_quoted_attribute(&url),
            self.config.image_width
        );
        let html = surface.content() + &img;
        surface.set_content(&html);
        self.apply_surface_html(&html, now_ms);
        self.written = Some(html);
        Ok(())
    }
}
