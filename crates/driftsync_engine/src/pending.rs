//! Pending operations map.
//!
//! Tracks the last optimistic snapshot per record until the remote write
//! confirms or fails. Mutated only by the optimistic update coordinator;
//! read by the conflict detector and the stats snapshot.

use driftsync_model::{OperationId, Record};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One pending optimistic operation.
#[derive(Debug, Clone)]
pub(crate) struct PendingEntry {
    /// The operation that produced this snapshot.
    pub op_id: OperationId,
    /// The optimistic snapshot.
    pub record: Record,
    /// When the snapshot was applied locally.
    pub applied_at: Instant,
}

/// The map of pending operations, keyed by `(table, record id)`.
///
/// At most one entry exists per key; a second local mutation before the
/// first resolves overwrites the snapshot (local last-writer-wins).
#[derive(Debug, Default)]
pub(crate) struct PendingOps {
    entries: Mutex<HashMap<(String, String), PendingEntry>>,
}

impl PendingOps {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a pending snapshot, returning the entry it displaced.
    pub(crate) fn begin(
        &self,
        table: &str,
        record: Record,
        op_id: OperationId,
    ) -> Option<PendingEntry> {
        let key = (table.to_owned(), record.id().to_owned());
        self.entries.lock().insert(
            key,
            PendingEntry {
                op_id,
                record,
                applied_at: Instant::now(),
            },
        )
    }

    /// Removes the entry for `(table, id)` if it still belongs to `op_id`.
    ///
    /// The ownership check keeps a completing write from clearing the
    /// snapshot of a later mutation that overwrote it.
    pub(crate) fn complete(&self, table: &str, id: &str, op_id: OperationId) {
        let key = (table.to_owned(), id.to_owned());
        let mut entries = self.entries.lock();
        if entries.get(&key).is_some_and(|e| e.op_id == op_id) {
            entries.remove(&key);
        }
    }

    /// Removes the entry for `(table, id)` unconditionally.
    pub(crate) fn clear(&self, table: &str, id: &str) {
        self.entries
            .lock()
            .remove(&(table.to_owned(), id.to_owned()));
    }

    /// Returns the pending entry for `(table, id)` if it was applied
    /// within `window`.
    pub(crate) fn get_within(&self, table: &str, id: &str, window: Duration) -> Option<PendingEntry> {
        let entries = self.entries.lock();
        let entry = entries.get(&(table.to_owned(), id.to_owned()))?;
        (entry.applied_at.elapsed() <= window).then(|| entry.clone())
    }

    /// Returns the number of pending operations.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, v: i64) -> Record {
        Record::from_value(json!({"id": id, "v": v})).unwrap()
    }

    #[test]
    fn begin_and_complete() {
        let pending = PendingOps::new();
        let op = OperationId::new();

        assert!(pending
            .begin("widgets", record("w1", 1), op)
            .is_none());
        assert_eq!(pending.len(), 1);

        pending.complete("widgets", "w1", op);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn overwrite_returns_displaced_entry() {
        let pending = PendingOps::new();
        let first = OperationId::new();
        let second = OperationId::new();

        pending.begin("widgets", record("w1", 1), first);
        let displaced = pending
            .begin("widgets", record("w1", 2), second)
            .unwrap();

        assert_eq!(displaced.op_id, first);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn complete_ignores_foreign_entries() {
        let pending = PendingOps::new();
        let first = OperationId::new();
        let second = OperationId::new();

        pending.begin("widgets", record("w1", 1), first);
        pending.begin("widgets", record("w1", 2), second);

        // The first operation resolving must not clear the second's snapshot.
        pending.complete("widgets", "w1", first);
        assert_eq!(pending.len(), 1);

        pending.complete("widgets", "w1", second);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn get_within_window() {
        let pending = PendingOps::new();
        let op = OperationId::new();
        pending.begin("orders", record("r1", 1), op);

        assert!(pending
            .get_within("orders", "r1", Duration::from_secs(60))
            .is_some());
        assert!(pending
            .get_within("orders", "r2", Duration::from_secs(60))
            .is_none());
        assert!(pending
            .get_within("orders", "r1", Duration::ZERO)
            .is_none());
    }

    #[test]
    fn tables_are_independent() {
        let pending = PendingOps::new();
        pending.begin("a", record("x", 1), OperationId::new());
        pending.begin("b", record("x", 1), OperationId::new());
        assert_eq!(pending.len(), 2);

        pending.clear("a", "x");
        assert_eq!(pending.len(), 1);
    }
}
