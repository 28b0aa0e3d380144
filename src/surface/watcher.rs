//! Edit detection for an HTML file used as the editing surface.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Reports the surface file's content after someone else changes it.
///
/// Writes land as bursts of filesystem events, so a change is reported only
/// once the file has been quiet for `settle`. Content equal to what the
/// watcher already knows is never reported: that covers repeated saves of the
/// same text and the host's own writes passed to [`SurfaceWatcher::acknowledge`].
pub struct SurfaceWatcher {
    events: Receiver<notify::Result<Event>>,
    file: PathBuf,
    settle: Duration,
    touched_at: Option<Instant>,
    known: Option<String>,
    _backend: RecommendedWatcher,
}

impl SurfaceWatcher {
    /// Start watching `path`, which must already exist.
    ///
    /// # Errors
    /// Returns an error if the path cannot be resolved or its directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, settle: Duration) -> notify::Result<Self> {
        // The OS reports canonical paths.
        let file = path.as_ref().canonicalize()?;
        let dir = file.parent().map_or_else(|| file.clone(), Path::to_path_buf);

        let (tx, events) = mpsc::channel();
        let mut backend = notify::recommended_watcher(move |event| {
            let _ = tx.send(event);
        })?;
        backend.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            events,
            known: fs::read_to_string(&file).ok(),
            file,
            settle,
            touched_at: None,
            _backend: backend,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Note content the host wrote itself, so it does not come back as an edit.
    pub fn acknowledge(&mut self, html: impl Into<String>) {
        self.known = Some(html.into());
    }

    /// The file's new content, once it has settled and differs from what is known.
    pub fn poll_change(&mut self) -> Option<String> {
        let events: Vec<_> = self.events.try_iter().collect();
        for event in events {
            match event {
                Ok(event) if self.touches_file(&event) => self.touched_at = Some(Instant::now()),
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "surface watcher error"),
            }
        }

        if self.touched_at?.elapsed() < self.settle {
            return None;
        }
        self.touched_at = None;

        let html = match fs::read_to_string(&self.file) {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(path = %self.file.display(), %err, "surface file unreadable");
                return None;
            }
        };
        if self.known.as_deref() == Some(html.as_str()) {
            tracing::trace!("surface file content already known");
            return None;
        }
        self.known = Some(html.clone());
        Some(html)
    }

    fn touches_file(&self, event: &Event) -> bool {
        !matches!(event.kind, EventKind::Access(_))
            && event
                .paths
                .iter()
                .any(|path| path == &self.file || path.file_name() == self.file.file_name())
    }
}
