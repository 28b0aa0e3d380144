//! Per-record editing controller.
//!
//! An [`EditorSession`] ties the pieces together:
//! - waits on the shared [`ScriptLoadGate`] before mounting a surface
//! - seeds the surface with the record's Markdown rendered to HTML
//! - turns every surface change into sanitized Markdown and debounces the write
//! - saves immediately on request, follows (or ignores, when locked) the
//!   host's record selection, and runs the image insertion dialog
//!
//! Hosts drive it with [`Message`]s through [`EditorSession::handle`] and
//! call [`EditorSession::poll`] from their loop to release debounced writes.

mod update;
mod view;

pub use update::Message;
pub use view::{EditorView, NOTHING_SELECTED, View};

use std::sync::Arc;

use thiserror::Error;

use crate::config::SessionConfig;
use crate::convert::Converter;
use crate::debounce::PersistenceDebouncer;
use crate::gate::{LoadState, ScriptLoadGate};
use crate::host::{
    EditorSurface, RecordRef, RecordStore, ScriptLoader, StoreError, SurfaceInit, SurfaceMount,
};
use crate::picker::ImagePicker;

/// Errors surfaced to the host by an editor session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to save notes for {record}: {source}")]
    Persist {
        record: RecordRef,
        #[source]
        source: StoreError,
    },
    #[error("failed to load {record}: {source}")]
    Load {
        record: RecordRef,
        #[source]
        source: StoreError,
    },
    #[error("image choice {0:?} is not an \"<id> <url>\" pair")]
    InvalidImageToken(String),
}

/// Sanitized Markdown waiting to be written to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub record: RecordRef,
    pub markdown: String,
}

/// The host-side pieces a session works with.
pub struct Collaborators<S> {
    pub store: S,
    pub mount: Box<dyn SurfaceMount>,
    pub loader: Arc<dyn ScriptLoader>,
}

/// Editing state for the host's active record.
pub struct EditorSession<S: RecordStore> {
    config: SessionConfig,
    converter: Converter,
    gate: Arc<ScriptLoadGate>,
    store: S,
    mount: Box<dyn SurfaceMount>,
    loader: Arc<dyn ScriptLoader>,
    target: Option<RecordRef>,
    load_state: LoadState,
    surface: Option<Box<dyn EditorSurface>>,
    /// HTML the session itself last put into the surface.
    written: Option<String>,
    draft: Option<String>,
    locked: bool,
    picker: Option<ImagePicker>,
    writes: PersistenceDebouncer<PendingWrite>,
}

impl<S: RecordStore> EditorSession<S> {
    /// Create a session for `target`.
    ///
    /// With a target, the session immediately asks the gate for the engine
    /// script and mounts the surface if it is already available. Without one
    /// it stays idle until the host selects a record.
    ///
    /// # Errors
    /// Returns an error if the record's content cannot be read while mounting.
    pub fn new(
        config: SessionConfig,
        gate: Arc<ScriptLoadGate>,
        host: Collaborators<S>,
        target: Option<RecordRef>,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            converter: Converter::new(config.placeholder.clone()),
            writes: PersistenceDebouncer::new(config.debounce_ms),
            config,
            gate,
            store: host.store,
            mount: host.mount,
            loader: host.loader,
            target,
            load_state: LoadState::NotLoaded,
            surface: None,
            written: None,
            draft: None,
            locked: false,
            picker: None,
        };
        session.sync_load_state()?;
        Ok(session)
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub const fn target(&self) -> Option<&RecordRef> {
        self.target.as_ref()
    }

    /// This session's view of the engine script, including its own surface init.
    pub const fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Latest sanitized Markdown from the surface, if anything was edited.
    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub const fn picker(&self) -> Option<&ImagePicker> {
        self.picker.as_ref()
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn has_pending_write(&self) -> bool {
        self.writes.is_pending()
    }

    /// Time at which the pending write becomes due.
    pub fn write_due_at(&self) -> Option<u64> {
        self.writes.due_at()
    }

    /// Current HTML of the mounted surface.
    pub fn surface_content(&self) -> Option<String> {
        self.surface.as_ref().map(|surface| surface.content())
    }

    /// Persist the pending write if its delay has passed.
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    /// Returns an error if the store rejects the write. The write is not retried.
    pub fn poll(&mut self, now_ms: u64) -> Result<bool, SessionError> {
        match self.writes.take_ready(now_ms) {
            Some(write) => self.persist(write).map(|()| true),
            None => Ok(false),
        }
    }

    /// Persist the pending write now, e.g. before shutting down.
    ///
    /// # Errors
    /// Returns an error if the store rejects the write.
    pub fn flush(&mut self) -> Result<bool, SessionError> {
        match self.writes.flush() {
            Some(write) => self.persist(write).map(|()| true),
            None => Ok(false),
        }
    }

    /// Catch up with the gate: start the script load, or mount once it is available.
    fn sync_load_state(&mut self) -> Result<(), SessionError> {
        if self.target.is_none() {
            return Ok(());
        }
        if self.load_state == LoadState::NotLoaded {
            self.load_state = self.gate.ensure_loading(self.loader.as_ref()).min(LoadState::Loaded);
        }
        if self.load_state < LoadState::Loaded && self.gate.is_available() {
            self.load_state = LoadState::Loaded;
        }
        if self.load_state.is_available() && self.surface.is_none() {
            self.mount_surface()?;
        }
        Ok(())
    }

    fn mount_surface(&mut self) -> Result<(), SessionError> {
        let Some(record) = self.target.clone() else {
            return Ok(());
        };
        let stored = self
            .store
            .get_field(&record, &self.config.content_field)
            .map_err(|source| SessionError::Load {
                record: record.clone(),
                source,
            })?;
        let html = self.converter.render_field(stored.as_deref());
        tracing::debug!(%record, "mounting editor surface");
        self.surface = Some(self.mount.mount(SurfaceInit::new(html.clone())));
        self.written = Some(html);
        Ok(())
    }

    /// Record the surface's HTML as the new draft and schedule its write.
    fn apply_surface_html(&mut self, html: &str, now_ms: u64) {
        let Some(record) = self.target.clone() else {
            return;
        };
        let markdown = self.converter.to_stored_markdown(html);
        self.draft = Some(markdown.clone());
        if self
            .writes
            .queue(PendingWrite { record, markdown }, now_ms)
            .is_some()
        {
            tracing::trace!("superseded pending write");
        }
    }

    fn persist(&mut self, write: PendingWrite) -> Result<(), SessionError> {
        let field = &self.config.content_field;
        match self.store.update_field(&write.record, field, &write.markdown) {
            Ok(()) => {
                tracing::debug!(record = %write.record, bytes = write.markdown.len(), "saved notes");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(record = %write.record, error = %source, "saving notes failed");
                Err(SessionError::Persist {
                    record: write.record,
                    source,
                })
            }
        }
    }
}
