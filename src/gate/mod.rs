//! One-time loading of the editor engine script.
//!
//! A single [`ScriptLoadGate`] is created per process and shared by every
//! editor session through an `Arc`. The first session that finds the gate
//! `NotLoaded` starts the load; everyone else just observes the state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::host::ScriptLoader;

/// Progress of the engine script, for the process or for one session.
///
/// States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LoadState {
    NotLoaded = 0,
    Loading = 1,
    Loaded = 2,
    Initialized = 3,
}

impl LoadState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotLoaded,
            1 => Self::Loading,
            2 => Self::Loaded,
            _ => Self::Initialized,
        }
    }

    /// Whether the script is available to mount surfaces.
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Loaded | Self::Initialized)
    }
}

/// Process-wide gate around the engine script.
#[derive(Debug)]
pub struct ScriptLoadGate {
    url: String,
    state: AtomicU8,
    loads_started: AtomicUsize,
}

impl ScriptLoadGate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: AtomicU8::new(LoadState::NotLoaded as u8),
            loads_started: AtomicUsize::new(0),
        }
    }

    /// URL of the script this gate loads.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the script has been fetched at some point in this process.
    pub fn is_available(&self) -> bool {
        self.state().is_available()
    }

    /// Number of loads ever started. Never more than one.
    pub fn loads_started(&self) -> usize {
        self.loads_started.load(Ordering::Relaxed)
    }

    /// Start the load if nobody has yet, and return the state afterwards.
    ///
    /// Only the caller that moves the gate out of `NotLoaded` calls `loader`.
    pub fn ensure_loading(self: &Arc<Self>, loader: &dyn ScriptLoader) -> LoadState {
        let started = self
            .state
            .compare_exchange(
                LoadState::NotLoaded as u8,
                LoadState::Loading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if started {
            self.loads_started.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %self.url, "loading editor script");
            loader.begin_load(
                &self.url,
                LoadCompletion {
                    gate: Arc::clone(self),
                },
            );
        }
        // The loader may have completed synchronously.
        self.state()
    }

    /// Record that some session's surface finished initializing.
    pub fn mark_initialized(&self) {
        self.advance(LoadState::Initialized);
    }

    fn advance(&self, to: LoadState) {
        let previous = LoadState::from_u8(self.state.fetch_max(to as u8, Ordering::AcqRel));
        if previous < to {
            tracing::debug!(from = ?previous, ?to, "script gate advanced");
        }
    }
}

/// Handed to a [`ScriptLoader`]; completing it marks the script available.
#[derive(Debug)]
pub struct LoadCompletion {
    gate: Arc<ScriptLoadGate>,
}

impl LoadCompletion {
    pub fn complete(self) {
        self.gate.advance(LoadState::Loaded);
    }
}
