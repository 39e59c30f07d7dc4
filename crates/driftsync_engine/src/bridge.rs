//! Change bridge abstraction.
//!
//! The change bridge is the external real-time notification mechanism
//! (a database change-feed, a websocket, ...) the engine treats as a black
//! box. The engine opens exactly one bridge subscription per table with at
//! least one listener; the bridge delivers [`RemoteChange`]s into the sink
//! the engine provides.

use crate::error::{EngineError, EngineResult};
use driftsync_model::{ChangeKind, Record};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A change observed on the remote side, as delivered by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChange {
    /// What happened.
    pub kind: ChangeKind,
    /// The table the change belongs to.
    pub table: String,
    /// The record after the change. For deletes this carries the deleted
    /// snapshot, so the record id is always available.
    pub record: Record,
    /// The record before the change, when the remote side provides it.
    pub old_record: Option<Record>,
}

impl RemoteChange {
    /// Creates a remote insert.
    #[must_use]
    pub fn insert(table: impl Into<String>, record: Record) -> Self {
        Self {
            kind: ChangeKind::Insert,
            table: table.into(),
            record,
            old_record: None,
        }
    }

    /// Creates a remote update.
    #[must_use]
    pub fn update(table: impl Into<String>, record: Record, old_record: Option<Record>) -> Self {
        Self {
            kind: ChangeKind::Update,
            table: table.into(),
            record,
            old_record,
        }
    }

    /// Creates a remote delete carrying the deleted snapshot.
    #[must_use]
    pub fn delete(table: impl Into<String>, record: Record) -> Self {
        Self {
            kind: ChangeKind::Delete,
            table: table.into(),
            record: record.clone(),
            old_record: Some(record),
        }
    }
}

/// The callback a bridge delivers remote changes into.
pub type RemoteSink = Arc<dyn Fn(RemoteChange) + Send + Sync>;

/// The external change-notification mechanism.
///
/// Implementations wrap whatever real-time feed the remote store offers.
/// `subscribe` is invoked while the engine holds its registry lock, which
/// is what guarantees at most one bridge subscription per table even under
/// concurrent subscribe calls.
pub trait ChangeBridge: Send + Sync {
    /// Opens a subscription for `table`, delivering changes into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Bridge`] if the feed refuses the
    /// subscription; the engine registers no listener in that case.
    fn subscribe(&self, table: &str, sink: RemoteSink) -> EngineResult<Box<dyn BridgeHandle>>;
}

/// Handle for one open bridge subscription.
///
/// Closing is idempotent; implementations should also close on drop.
pub trait BridgeHandle: Send {
    /// Tears the subscription down.
    fn close(&mut self);
}

/// An in-memory bridge for tests.
///
/// Tracks open subscriptions per table and lets tests push remote changes
/// synchronously into the engine.
#[derive(Clone, Default)]
pub struct MockBridge {
    inner: Arc<MockBridgeInner>,
}

#[derive(Default)]
struct MockBridgeInner {
    sinks: Mutex<HashMap<u64, (String, RemoteSink)>>,
    next_id: AtomicU64,
    fail_next: AtomicBool,
}

impl MockBridge {
    /// Creates a new mock bridge with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `subscribe` call fail.
    pub fn fail_next_subscribe(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// Delivers a remote change to every open subscription on its table.
    ///
    /// Returns the number of subscriptions that received the change.
    pub fn push(&self, change: RemoteChange) -> usize {
        let sinks: Vec<RemoteSink> = self
            .inner
            .sinks
            .lock()
            .values()
            .filter(|(table, _)| *table == change.table)
            .map(|(_, sink)| Arc::clone(sink))
            .collect();

        for sink in &sinks {
            sink(change.clone());
        }
        sinks.len()
    }

    /// Returns the total number of open subscriptions.
    #[must_use]
    pub fn open_subscriptions(&self) -> usize {
        self.inner.sinks.lock().len()
    }

    /// Returns the number of open subscriptions for one table.
    #[must_use]
    pub fn subscriptions_for(&self, table: &str) -> usize {
        self.inner
            .sinks
            .lock()
            .values()
            .filter(|(t, _)| t == table)
            .count()
    }
}

impl ChangeBridge for MockBridge {
    fn subscribe(&self, table: &str, sink: RemoteSink) -> EngineResult<Box<dyn BridgeHandle>> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Bridge(format!(
                "mock bridge refused subscription for table {table}"
            )));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .sinks
            .lock()
            .insert(id, (table.to_owned(), sink));

        Ok(Box::new(MockBridgeHandle {
            inner: Arc::clone(&self.inner),
            id,
            closed: false,
        }))
    }
}

struct MockBridgeHandle {
    inner: Arc<MockBridgeInner>,
    id: u64,
    closed: bool,
}

impl BridgeHandle for MockBridgeHandle {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.sinks.lock().remove(&self.id);
        }
    }
}

impl Drop for MockBridgeHandle {
    fn drop(&mut self) {
        self.close();
    }
}
