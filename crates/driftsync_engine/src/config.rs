//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for a [`crate::SyncEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long after an optimistic mutation an incoming remote change on
    /// the same record is treated as conflicting rather than applied.
    pub conflict_window: Duration,
    /// Maximum number of events archived per queue drain tick.
    pub drain_batch_size: usize,
    /// Maximum number of events kept in the durable history store; older
    /// entries are evicted first.
    pub history_cap: usize,
}

impl EngineConfig {
    /// Creates a configuration with the default settings: a 60 second
    /// conflict window, drain batches of 10, and 100 history entries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conflict_window: Duration::from_secs(60),
            drain_batch_size: 10,
            history_cap: 100,
        }
    }

    /// Sets the conflict detection window.
    #[must_use]
    pub fn with_conflict_window(mut self, window: Duration) -> Self {
        self.conflict_window = window;
        self
    }

    /// Sets the queue drain batch size.
    #[must_use]
    pub fn with_drain_batch_size(mut self, size: usize) -> Self {
        self.drain_batch_size = size.max(1);
        self
    }

    /// Sets the history cap.
    #[must_use]
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
