//! Debounce timer for the legacy snapshot mirror.

use std::time::{Duration, Instant};

/// Delay between the last change and the legacy write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Tracks pending changes and decides when a write is due.
///
/// Time is passed in explicitly so the surface stays free of timers.
#[derive(Debug, Clone)]
pub struct DebouncedSync {
    delay: Duration,
    dirty_since: Option<Instant>,
}

impl Default for DebouncedSync {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl DebouncedSync {
    /// Create a debouncer with the given delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            dirty_since: None,
        }
    }

    /// Record a change. Each change restarts the delay.
    pub fn mark(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    /// Whether a change is waiting to be written.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Whether the delay has elapsed since the last change.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.dirty_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.delay)
    }

    /// Consume a due write. Returns `true` if the caller should write now.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.dirty_since = None;
            true
        } else {
            false
        }
    }

    /// Drop any pending change.
    pub fn reset(&mut self) {
        self.dirty_since = None;
    }
}
