//! Coalescing of rapid content changes into one delayed write.
//!
//! The debouncer is driven by the caller's clock: `queue` with the time of
//! the change, then `take_ready` from the event loop's poll.

/// Holds the latest payload of an edit burst until the burst goes quiet.
///
/// Queuing replaces whatever was pending and restarts the delay, so only the
/// last payload of a burst is ever released.
#[derive(Debug, Clone)]
pub struct PersistenceDebouncer<T> {
    delay_ms: u64,
    pending: Option<(T, u64)>,
}

impl<T> PersistenceDebouncer<T> {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Schedule `payload`, returning the payload it superseded.
    pub fn queue(&mut self, payload: T, now_ms: u64) -> Option<T> {
        self.pending
            .replace((payload, now_ms))
            .map(|(superseded, _)| superseded)
    }

    /// Release the pending payload once `delay_ms` has passed since it was queued.
    pub fn take_ready(&mut self, now_ms: u64) -> Option<T> {
        let (_, queued_at) = self.pending.as_ref()?;
        if now_ms.saturating_sub(*queued_at) >= self.delay_ms {
            self.pending.take().map(|(payload, _)| payload)
        } else {
            None
        }
    }

    /// Release the pending payload now, regardless of the delay.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(payload, _)| payload)
    }

    /// Drop the pending payload without releasing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.flush()
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time at which the pending payload becomes ready.
    pub fn due_at(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|(_, queued_at)| queued_at.saturating_add(self.delay_ms))
    }
}
