//! Subscription registry.
//!
//! Tracks per-table listener sets and owns exactly one change-bridge
//! subscription per table with at least one listener. Pure bookkeeping
//! plus bridge lifecycle; it never emits events itself.

use crate::bridge::BridgeHandle;
use crate::error::EngineResult;
use driftsync_model::{ListenerId, Record, SyncEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback invoked for every delivered event.
pub(crate) type EventCallback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Optional per-listener record predicate.
pub(crate) type RecordFilter = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// A registered observer of one table.
#[derive(Clone)]
pub(crate) struct RegisteredListener {
    pub id: ListenerId,
    pub callback: EventCallback,
    pub filter: Option<RecordFilter>,
}

struct TableEntry {
    listeners: Vec<RegisteredListener>,
    bridge_handle: Box<dyn BridgeHandle>,
}

#[derive(Default)]
struct RegistryState {
    tables: HashMap<String, TableEntry>,
    // listener id -> table, for unsubscribe lookups
    index: HashMap<ListenerId, String>,
}

/// Tracks listeners per table and the bridge subscription each table owns.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `table`.
    ///
    /// `open_bridge` is invoked while the registry lock is held when this
    /// is the first listener for the table; concurrent subscribers can
    /// therefore never open a duplicate bridge subscription. If the bridge
    /// refuses, no listener is registered.
    pub(crate) fn subscribe(
        &self,
        table: &str,
        callback: EventCallback,
        filter: Option<RecordFilter>,
        open_bridge: impl FnOnce() -> EngineResult<Box<dyn BridgeHandle>>,
    ) -> EngineResult<ListenerId> {
        let mut state = self.state.lock();

        if !state.tables.contains_key(table) {
            let bridge_handle = open_bridge()?;
            debug!(table, "opened bridge subscription");
            state.tables.insert(
                table.to_owned(),
                TableEntry {
                    listeners: Vec::new(),
                    bridge_handle,
                },
            );
        }

        let id = ListenerId::new();
        if let Some(entry) = state.tables.get_mut(table) {
            entry.listeners.push(RegisteredListener {
                id,
                callback,
                filter,
            });
        }
        state.index.insert(id, table.to_owned());
        debug!(listener = %id, table, "listener registered");
        Ok(id)
    }

    /// Removes a listener; closes the bridge subscription when the last
    /// listener for its table leaves. Unknown ids are a logged no-op.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();

        let Some(table) = state.index.remove(&id) else {
            warn!(listener = %id, "unsubscribe for unknown listener");
            return false;
        };

        let remove_table = if let Some(entry) = state.tables.get_mut(&table) {
            entry.listeners.retain(|l| l.id != id);
            entry.listeners.is_empty()
        } else {
            false
        };

        if remove_table {
            if let Some(mut entry) = state.tables.remove(&table) {
                entry.bridge_handle.close();
                debug!(table, "closed bridge subscription");
            }
        }
        true
    }

    /// Snapshots the listener set for `table`.
    ///
    /// The snapshot lets the event bus invoke callbacks without holding
    /// the registry lock, so callbacks may subscribe or unsubscribe freely.
    pub(crate) fn listeners_for(&self, table: &str) -> Vec<RegisteredListener> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|entry| entry.listeners.clone())
            .unwrap_or_default()
    }

    /// Returns the total number of registered listeners.
    pub(crate) fn listener_count(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Returns the number of open bridge subscriptions.
    pub(crate) fn subscription_count(&self) -> usize {
        self.state.lock().tables.len()
    }

    /// Closes every bridge subscription and drops all listeners.
    pub(crate) fn close_all(&self) {
        let mut state = self.state.lock();
        for (table, mut entry) in state.tables.drain() {
            entry.bridge_handle.close();
            debug!(table, "closed bridge subscription on shutdown");
        }
        state.index.clear();
    }
}
