//! An editing surface backed by an HTML file.
//!
//! Lets any external HTML editor act as the rich-text surface: mounting
//! writes the rendered document to the file, and the host feeds file
//! modifications back to the session as content changes.

mod watcher;

pub use watcher::SurfaceWatcher;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::host::{EditorSurface, SurfaceInit, SurfaceMount};

/// Surface whose content is the HTML file at `path`.
#[derive(Debug)]
pub struct HtmlFileSurface {
    path: PathBuf,
    last_known: RefCell<String>,
}

impl HtmlFileSurface {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EditorSurface for HtmlFileSurface {
    /// Reads the file; falls back to the last content seen if it is unreadable.
    fn content(&self) -> String {
        match fs::read_to_string(&self.path) {
            Ok(html) => {
                self.last_known.replace(html.clone());
                html
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "surface file unreadable");
                self.last_known.borrow().clone()
            }
        }
    }

    fn set_content(&mut self, html: &str) {
        if let Err(err) = fs::write(&self.path, html) {
            tracing::warn!(path = %self.path.display(), %err, "failed to write surface file");
        }
        self.last_known.replace(html.to_string());
    }
}

/// Mounts [`HtmlFileSurface`]s on a fixed path.
#[derive(Debug, Clone)]
pub struct HtmlFileMount {
    path: PathBuf,
    keep_existing: bool,
}

impl HtmlFileMount {
    /// Mounting overwrites the file with the rendered record.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_existing: false,
        }
    }

    /// Mounting reuses the file's current content when it exists, so edits
    /// made while no session was running are not lost.
    pub fn attach(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_existing: true,
        }
    }
}

impl SurfaceMount for HtmlFileMount {
    fn mount(&mut self, init: SurfaceInit) -> Box<dyn EditorSurface> {
        let mut surface = HtmlFileSurface {
            path: self.path.clone(),
            last_known: RefCell::new(init.html.clone()),
        };
        if self.keep_existing && self.path.exists() {
            tracing::debug!(path = %self.path.display(), "attaching to existing surface file");
        } else {
            surface.set_content(&init.html);
        }
        Box::new(surface)
    }
}
