//! Engine statistics.

/// A point-in-time snapshot of engine state, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Registered listeners across all tables.
    pub listener_count: usize,
    /// Open bridge subscriptions (at most one per table).
    pub subscription_count: usize,
    /// Conflicts detected, resolved ones included.
    pub conflict_count: usize,
    /// Conflicts still awaiting resolution.
    pub unresolved_conflict_count: usize,
    /// Events waiting to be archived to history.
    pub queue_size: usize,
    /// Optimistic operations with remote writes still in flight.
    pub pending_operations: usize,
}
