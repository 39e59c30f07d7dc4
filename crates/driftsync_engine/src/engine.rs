//! The engine facade.

use crate::bridge::{ChangeBridge, RemoteSink};
use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::conflict::{BatchResolution, ConflictManager};
use crate::coordinator::OptimisticCoordinator;
use crate::error::EngineResult;
use crate::pending::PendingOps;
use crate::queue::QueueProcessor;
use crate::registry::SubscriptionRegistry;
use crate::remote::RemoteStore;
use crate::stats::StatsSnapshot;
use driftsync_model::{
    ChangeKind, ConflictId, ListenerId, Record, Resolution, SyncConflict, SyncEvent,
};
use driftsync_storage::StorageBackend;
use std::sync::Arc;
use tracing::info;

/// The synchronization engine.
///
/// Owns the subscription registry, the optimistic update path, conflict
/// detection and the event history queue, and wires the change bridge
/// into all of them. One engine instance serves any number of tables.
///
/// All methods take `&self`; the engine is internally synchronized and
/// can be shared behind an [`Arc`] across tasks.
pub struct SyncEngine<R> {
    bridge: Arc<dyn ChangeBridge>,
    registry: Arc<SubscriptionRegistry>,
    queue: Arc<QueueProcessor>,
    coordinator: OptimisticCoordinator<R>,
    conflicts: Arc<ConflictManager<R>>,
    pending: Arc<PendingOps>,
    sink: RemoteSink,
}

impl<R: RemoteStore + 'static> SyncEngine<R> {
    /// Creates an engine over the given storage, bridge, and remote store.
    ///
    /// Conflicts persisted by a previous run are reloaded; the event
    /// history sequence resumes where it left off.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted conflicts cannot be read or decoded.
    pub fn new(
        config: EngineConfig,
        storage: Arc<dyn StorageBackend>,
        bridge: Arc<dyn ChangeBridge>,
        remote: Arc<R>,
    ) -> EngineResult<Self> {
        let pending = Arc::new(PendingOps::new());
        let registry = Arc::new(SubscriptionRegistry::new());
        let queue = Arc::new(QueueProcessor::new(
            Arc::clone(&storage),
            config.drain_batch_size,
            config.history_cap,
        ));
        let bus = EventBus::new(Arc::clone(&registry), Arc::clone(&queue));

        let conflicts = Arc::new(ConflictManager::new(
            config.conflict_window,
            Arc::clone(&pending),
            storage,
            Arc::clone(&remote),
            bus.clone(),
        )?);

        let sink: RemoteSink = {
            let conflicts = Arc::clone(&conflicts);
            Arc::new(move |change| conflicts.handle_remote(change))
        };

        let coordinator = OptimisticCoordinator::new(Arc::clone(&pending), remote, bus);
        info!(reloaded_conflicts = conflicts.count(), "engine initialized");

        Ok(Self {
            bridge,
            registry,
            queue,
            coordinator,
            conflicts,
            pending,
            sink,
        })
    }

    /// Registers a listener for every event on `table`.
    ///
    /// The first listener on a table opens the bridge subscription for it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Bridge`] if the bridge refuses the
    /// subscription; no listener is registered in that case.
    pub fn subscribe(
        &self,
        table: &str,
        callback: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> EngineResult<ListenerId> {
        self.subscribe_inner(table, Arc::new(callback), None)
    }

    /// Registers a listener that only receives events whose record passes
    /// `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::subscribe`].
    pub fn subscribe_filtered(
        &self,
        table: &str,
        callback: impl Fn(&SyncEvent) + Send + Sync + 'static,
        filter: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> EngineResult<ListenerId> {
        self.subscribe_inner(table, Arc::new(callback), Some(Arc::new(filter)))
    }

    fn subscribe_inner(
        &self,
        table: &str,
        callback: crate::registry::EventCallback,
        filter: Option<crate::registry::RecordFilter>,
    ) -> EngineResult<ListenerId> {
        self.registry.subscribe(table, callback, filter, || {
            self.bridge.subscribe(table, Arc::clone(&self.sink))
        })
    }

    /// Removes a listener; closes the table's bridge subscription when it
    /// was the last one. Returns false for an unknown id.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Inserts a record optimistically.
    ///
    /// Returns the confirmed record, which may carry a server-assigned id
    /// replacing a temporary local one.
    ///
    /// # Errors
    ///
    /// Returns the remote store's error after rolling the optimistic
    /// insert back with a compensating delete event.
    pub async fn insert(&self, table: &str, record: Record) -> EngineResult<Record> {
        self.coordinator
            .apply_local(table, record, ChangeKind::Insert)
            .await
    }

    /// Updates a record optimistically.
    ///
    /// # Errors
    ///
    /// Returns the remote store's error after emitting a compensating
    /// event.
    pub async fn update(&self, table: &str, record: Record) -> EngineResult<Record> {
        self.coordinator
            .apply_local(table, record, ChangeKind::Update)
            .await
    }

    /// Deletes a record optimistically. `record` is the snapshot being
    /// deleted; it is restored by the compensating event if the remote
    /// delete fails.
    ///
    /// # Errors
    ///
    /// Returns the remote store's error after emitting a compensating
    /// insert event.
    pub async fn delete(&self, table: &str, record: Record) -> EngineResult<Record> {
        self.coordinator
            .apply_local(table, record, ChangeKind::Delete)
            .await
    }

    /// Resolves one conflict. Pass `merged` to supply an explicit merge
    /// result; otherwise [`Resolution::Merge`] shallow-merges with local
    /// fields winning.
    ///
    /// # Errors
    ///
    /// See [`crate::EngineError::ConflictNotFound`],
    /// [`crate::EngineError::ConflictAlreadyResolved`] and
    /// [`crate::EngineError::Remote`].
    pub async fn resolve_conflict(
        &self,
        id: ConflictId,
        resolution: Resolution,
        merged: Option<Record>,
    ) -> EngineResult<Record> {
        self.conflicts.resolve(id, resolution, merged).await
    }

    /// Resolves a batch of conflicts, continuing past failures.
    pub async fn resolve_conflicts(
        &self,
        resolutions: &[(ConflictId, Resolution)],
    ) -> BatchResolution {
        self.conflicts.resolve_many(resolutions).await
    }

    /// Returns every conflict detected so far, resolved ones included.
    #[must_use]
    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.conflicts.all()
    }

    /// Returns the conflicts still awaiting resolution.
    #[must_use]
    pub fn unresolved_conflicts(&self) -> Vec<SyncConflict> {
        self.conflicts.unresolved()
    }

    /// Reads up to `limit` archived events, oldest first.
    #[must_use]
    pub fn history(&self, limit: usize) -> Vec<SyncEvent> {
        self.queue.history(limit)
    }

    /// Returns a point-in-time snapshot of engine state.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            listener_count: self.registry.listener_count(),
            subscription_count: self.registry.subscription_count(),
            conflict_count: self.conflicts.count(),
            unresolved_conflict_count: self.conflicts.unresolved_count(),
            queue_size: self.queue.len(),
            pending_operations: self.pending.len(),
        }
    }

    /// Shuts the engine down: closes every bridge subscription and drains
    /// the remaining events to history.
    pub fn shutdown(&self) {
        self.registry.close_all();
        self.queue.drain_all();
        info!("engine shut down");
    }
}
