//! Optimistic update coordinator.
//!
//! A local mutation is applied in three steps: record the pending
//! snapshot, emit the local event immediately, then await the remote
//! write. Confirmation clears the pending entry; failure rolls the
//! mutation back with a compensating event before the error is returned.

use crate::bus::EventBus;
use crate::error::EngineResult;
use crate::pending::{PendingEntry, PendingOps};
use crate::remote::RemoteStore;
use driftsync_model::{ChangeKind, EventSource, EventType, OperationId, Record, SyncEvent};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct OptimisticCoordinator<R> {
    pending: Arc<PendingOps>,
    remote: Arc<R>,
    bus: EventBus,
}

impl<R: RemoteStore> OptimisticCoordinator<R> {
    pub(crate) fn new(pending: Arc<PendingOps>, remote: Arc<R>, bus: EventBus) -> Self {
        Self {
            pending,
            remote,
            bus,
        }
    }

    /// Applies a local mutation optimistically.
    ///
    /// Listeners observe the local event before the remote write is even
    /// attempted. On success the confirmed record is returned; for inserts
    /// it may carry a server-assigned id replacing a temporary local one,
    /// announced to listeners through a `Sync` event. On failure the
    /// pending entry is cleared, a compensating event restores what
    /// listeners saw before, and the remote error is returned.
    pub(crate) async fn apply_local(
        &self,
        table: &str,
        record: Record,
        kind: ChangeKind,
    ) -> EngineResult<Record> {
        let op_id = OperationId::new();
        let local_id = record.id().to_owned();
        let displaced = self.pending.begin(table, record.clone(), op_id);

        self.bus.emit(SyncEvent::local(kind, table, record.clone()));

        let outcome = match kind {
            ChangeKind::Insert => self.remote.insert(table, record.clone()).await,
            ChangeKind::Update => self
                .remote
                .update(table, &local_id, record.clone())
                .await
                .map(|()| record.clone()),
            ChangeKind::Delete => self
                .remote
                .delete(table, &local_id)
                .await
                .map(|()| record.clone()),
        };

        match outcome {
            Ok(confirmed) => {
                self.pending.complete(table, &local_id, op_id);
                if confirmed.id() != local_id {
                    debug!(
                        table,
                        local = %local_id,
                        confirmed = %confirmed.id(),
                        "remapping temporary record id"
                    );
                    self.bus.emit(SyncEvent::new(
                        EventType::Sync,
                        table,
                        confirmed.clone(),
                        Some(record),
                        EventSource::Local,
                    ));
                }
                Ok(confirmed)
            }
            Err(error) => {
                warn!(table, record = %local_id, %error, "remote write failed, rolling back");
                self.pending.complete(table, &local_id, op_id);
                self.bus.emit(compensating_event(table, &record, kind, displaced));
                Err(error)
            }
        }
    }
}

/// Builds the event that undoes a failed optimistic mutation.
///
/// A failed insert is undone by a delete, a failed delete by an insert
/// restoring the snapshot. A failed update restores the snapshot it
/// displaced when one exists; otherwise the previous value is unknown
/// locally and a `Sync` event signals listeners to re-fetch.
fn compensating_event(
    table: &str,
    record: &Record,
    kind: ChangeKind,
    displaced: Option<PendingEntry>,
) -> SyncEvent {
    match kind {
        ChangeKind::Insert => SyncEvent::new(
            EventType::Delete,
            table,
            record.clone(),
            Some(record.clone()),
            EventSource::Local,
        ),
        ChangeKind::Delete => SyncEvent::new(
            EventType::Insert,
            table,
            record.clone(),
            None,
            EventSource::Local,
        ),
        ChangeKind::Update => match displaced {
            Some(entry) => SyncEvent::new(
                EventType::Update,
                table,
                entry.record,
                Some(record.clone()),
                EventSource::Local,
            ),
            None => SyncEvent::new(
                EventType::Sync,
                table,
                record.clone(),
                None,
                EventSource::Local,
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeHandle;
    use crate::queue::QueueProcessor;
    use crate::registry::SubscriptionRegistry;
    use crate::remote::MockRemoteStore;
    use driftsync_storage::{MemoryBackend, StorageBackend};
    use parking_lot::Mutex;
    use serde_json::json;

    struct NoopHandle;
    impl BridgeHandle for NoopHandle {
        fn close(&mut self) {}
    }

    struct Harness {
        coordinator: OptimisticCoordinator<MockRemoteStore>,
        remote: Arc<MockRemoteStore>,
        pending: Arc<PendingOps>,
        seen: Arc<Mutex<Vec<SyncEvent>>>,
    }

    fn harness(remote: MockRemoteStore) -> Harness {
        let registry = Arc::new(SubscriptionRegistry::new());
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let queue = Arc::new(QueueProcessor::new(storage, 10, 100));
        let bus = EventBus::new(Arc::clone(&registry), queue);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry
            .subscribe(
                "widgets",
                Arc::new(move |event: &SyncEvent| sink.lock().push(event.clone())),
                None,
                || Ok(Box::new(NoopHandle)),
            )
            .unwrap();

        let remote = Arc::new(remote);
        let pending = Arc::new(PendingOps::new());
        Harness {
            coordinator: OptimisticCoordinator::new(
                Arc::clone(&pending),
                Arc::clone(&remote),
                bus,
            ),
            remote,
            pending,
            seen,
        }
    }

    fn record(id: &str, v: i64) -> Record {
        Record::from_value(json!({"id": id, "v": v})).unwrap()
    }

    #[tokio::test]
    async fn insert_emits_before_remote_confirms() {
        let h = harness(MockRemoteStore::new());

        let confirmed = h
            .coordinator
            .apply_local("widgets", record("w1", 1), ChangeKind::Insert)
            .await
            .unwrap();

        assert_eq!(confirmed.id(), "w1");
        assert_eq!(h.remote.len("widgets"), 1);
        assert_eq!(h.pending.len(), 0);

        let seen = h.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type, EventType::Insert);
        assert_eq!(seen[0].source, EventSource::Local);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_with_delete() {
        let h = harness(MockRemoteStore::new());
        h.remote.fail_next("offline");

        let err = h
            .coordinator
            .apply_local("widgets", record("w1", 1), ChangeKind::Insert)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::EngineError::Remote { .. }));
        assert_eq!(h.pending.len(), 0);
        assert_eq!(h.remote.len("widgets"), 0);

        let seen = h.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].event_type, EventType::Insert);
        assert_eq!(seen[1].event_type, EventType::Delete);
        assert_eq!(seen[1].record.id(), "w1");
    }

    #[tokio::test]
    async fn failed_delete_restores_record() {
        let h = harness(MockRemoteStore::new());
        h.coordinator
            .apply_local("widgets", record("w1", 1), ChangeKind::Insert)
            .await
            .unwrap();
        h.remote.fail_next("offline");

        h.coordinator
            .apply_local("widgets", record("w1", 1), ChangeKind::Delete)
            .await
            .unwrap_err();

        let seen = h.seen.lock();
        let last = seen.last().unwrap();
        assert_eq!(last.event_type, EventType::Insert);
        assert_eq!(last.record.id(), "w1");
        assert_eq!(h.remote.len("widgets"), 1);
    }

    #[tokio::test]
    async fn failed_update_without_history_signals_refetch() {
        let h = harness(MockRemoteStore::new());
        h.remote.fail_next("offline");

        h.coordinator
            .apply_local("widgets", record("w1", 2), ChangeKind::Update)
            .await
            .unwrap_err();

        let seen = h.seen.lock();
        assert_eq!(seen.last().unwrap().event_type, EventType::Sync);
    }

    #[tokio::test]
    async fn server_assigned_id_is_announced() {
        let h = harness(MockRemoteStore::with_server_ids());

        let confirmed = h
            .coordinator
            .apply_local("widgets", record("temp_7", 1), ChangeKind::Insert)
            .await
            .unwrap();
        assert_eq!(confirmed.id(), "rec_0");

        let seen = h.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].event_type, EventType::Sync);
        assert_eq!(seen[1].record.id(), "rec_0");
        assert_eq!(seen[1].old_record.as_ref().unwrap().id(), "temp_7");
    }

    #[tokio::test]
    async fn pending_entry_visible_during_held_write() {
        let h = harness(MockRemoteStore::new());
        let gate = h.remote.hold_next();

        let write = h
            .coordinator
            .apply_local("widgets", record("w1", 1), ChangeKind::Update);
        tokio::pin!(write);

        let parked =
            tokio::time::timeout(std::time::Duration::from_millis(20), &mut write).await;
        assert!(parked.is_err());
        assert_eq!(h.pending.len(), 1);

        gate.add_permits(1);
        write.await.unwrap();
        assert_eq!(h.pending.len(), 0);
    }
}
