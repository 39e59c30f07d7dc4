//! Conflict detection, storage, and resolution.
//!
//! Every remote change is checked against the pending operations map. A
//! hit inside the conflict window means a local write is in flight for
//! the same record; the remote change is held back as a [`SyncConflict`]
//! instead of being applied. Conflicts are persisted immediately, survive
//! restarts, and transition exactly once to resolved.

use crate::bridge::RemoteChange;
use crate::bus::EventBus;
use crate::error::{EngineError, EngineResult};
use crate::pending::PendingOps;
use crate::remote::RemoteStore;
use driftsync_model::{
    codec, ConflictId, EventSource, EventType, Record, Resolution, SyncConflict, SyncEvent,
};
use driftsync_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const CONFLICT_PREFIX: &str = "conflict/";

fn conflict_key(id: ConflictId) -> String {
    format!("{CONFLICT_PREFIX}{id}")
}

/// Outcome of a batch resolution; failures do not stop the batch.
#[derive(Debug, Default)]
pub struct BatchResolution {
    /// Conflicts resolved successfully.
    pub resolved: Vec<ConflictId>,
    /// Conflicts that failed, with the error each one hit.
    pub failed: Vec<(ConflictId, EngineError)>,
}

impl BatchResolution {
    /// True when every requested conflict resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub(crate) struct ConflictManager<R> {
    conflict_window: Duration,
    pending: Arc<PendingOps>,
    conflicts: Mutex<Vec<SyncConflict>>,
    storage: Arc<dyn StorageBackend>,
    remote: Arc<R>,
    bus: EventBus,
}

impl<R: RemoteStore> ConflictManager<R> {
    /// Creates a manager, reloading any persisted conflicts.
    pub(crate) fn new(
        conflict_window: Duration,
        pending: Arc<PendingOps>,
        storage: Arc<dyn StorageBackend>,
        remote: Arc<R>,
        bus: EventBus,
    ) -> EngineResult<Self> {
        let mut conflicts = Vec::new();
        for key in storage.list_keys(CONFLICT_PREFIX)? {
            if let Some(bytes) = storage.get(&key)? {
                conflicts.push(codec::decode::<SyncConflict>(&bytes)?);
            }
        }
        // Detection order is lost across restarts; timestamps restore it.
        conflicts.sort_by_key(|c| c.timestamp_ms);

        Ok(Self {
            conflict_window,
            pending,
            conflicts: Mutex::new(conflicts),
            storage,
            remote,
            bus,
        })
    }

    /// Routes one remote change: applies it as a remote event, or holds it
    /// back as a conflict when a pending local write on the same record
    /// falls inside the conflict window.
    ///
    /// Called synchronously from the bridge sink.
    pub(crate) fn handle_remote(&self, change: RemoteChange) {
        let pending = self.pending.get_within(
            &change.table,
            change.record.id(),
            self.conflict_window,
        );

        let Some(entry) = pending else {
            self.bus.emit(SyncEvent::remote(
                change.kind,
                change.table,
                change.record,
                change.old_record,
            ));
            return;
        };

        let conflict = SyncConflict::new(&change.table, entry.record, change.record);
        info!(
            conflict = %conflict.id,
            table = %conflict.table,
            record = %conflict.record_id(),
            "write-write conflict detected"
        );
        self.persist(&conflict);
        let event = SyncEvent::conflict(
            &conflict.table,
            conflict.remote_record.clone(),
            conflict.local_record.clone(),
        );
        self.conflicts.lock().push(conflict);
        self.bus.emit(event);
    }

    /// Resolves one conflict with the given strategy.
    ///
    /// The winning record is written to the remote store for every
    /// strategy; the store may have moved past the held-back snapshot
    /// since detection, so even `Remote` writes it back. On success the
    /// conflict is marked resolved, the pending entry for the record is
    /// cleared, and an update event announces the winner.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConflictNotFound`] for unknown ids and
    /// [`EngineError::ConflictAlreadyResolved`] on a second resolution; a
    /// failed remote write leaves the conflict unresolved.
    pub(crate) async fn resolve(
        &self,
        id: ConflictId,
        resolution: Resolution,
        merged: Option<Record>,
    ) -> EngineResult<Record> {
        let (table, record_id, winner) = {
            let conflicts = self.conflicts.lock();
            let conflict = conflicts
                .iter()
                .find(|c| c.id == id)
                .ok_or(EngineError::ConflictNotFound(id))?;
            if conflict.resolved {
                return Err(EngineError::ConflictAlreadyResolved(id));
            }
            (
                conflict.table.clone(),
                conflict.record_id().to_owned(),
                conflict.resolved_record(resolution, merged),
            )
        };

        self.remote
            .update(&table, &record_id, winner.clone())
            .await?;

        let updated = {
            let mut conflicts = self.conflicts.lock();
            conflicts
                .iter_mut()
                .find(|c| c.id == id)
                .map(|conflict| {
                    conflict.mark_resolved(resolution);
                    conflict.clone()
                })
        };
        if let Some(conflict) = updated {
            self.persist(&conflict);
        }
        self.pending.clear(&table, &record_id);

        let source = match resolution {
            Resolution::Remote => EventSource::Remote,
            Resolution::Local | Resolution::Merge => EventSource::Local,
        };
        self.bus.emit(SyncEvent::new(
            EventType::Update,
            &table,
            winner.clone(),
            None,
            source,
        ));
        info!(conflict = %id, table, record = %record_id, ?resolution, "conflict resolved");
        Ok(winner)
    }

    /// Resolves a batch of conflicts, continuing past failures.
    pub(crate) async fn resolve_many(
        &self,
        resolutions: &[(ConflictId, Resolution)],
    ) -> BatchResolution {
        let mut outcome = BatchResolution::default();
        for &(id, resolution) in resolutions {
            match self.resolve(id, resolution, None).await {
                Ok(_) => outcome.resolved.push(id),
                Err(error) => outcome.failed.push((id, error)),
            }
        }
        outcome
    }

    /// Returns every conflict, resolved ones included, in detection order.
    pub(crate) fn all(&self) -> Vec<SyncConflict> {
        self.conflicts.lock().clone()
    }

    /// Returns the conflicts still awaiting resolution.
    pub(crate) fn unresolved(&self) -> Vec<SyncConflict> {
        self.conflicts
            .lock()
            .iter()
            .filter(|c| !c.resolved)
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self) -> usize {
        self.conflicts.lock().len()
    }

    pub(crate) fn unresolved_count(&self) -> usize {
        self.conflicts.lock().iter().filter(|c| !c.resolved).count()
    }

    /// Persistence is best-effort; the in-memory conflict remains
    /// authoritative for this process either way.
    fn persist(&self, conflict: &SyncConflict) {
        let bytes = match codec::encode(conflict) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(conflict = %conflict.id, %error, "failed to encode conflict");
                return;
            }
        };
        if let Err(error) = self.storage.set(&conflict_key(conflict.id), &bytes) {
            warn!(conflict = %conflict.id, %error, "failed to persist conflict");
        }
    }
}
