//! Remote write/read store abstraction.

use crate::error::{EngineError, EngineResult};
use driftsync_model::Record;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// The remote data store the engine reconciles against.
///
/// All operations are asynchronous and may fail; the engine performs no
/// retries at this layer. `insert` returns the canonical stored record so
/// the engine can remap client-generated temporary ids to the id the store
/// actually assigned.
pub trait RemoteStore: Send + Sync {
    /// Inserts a record, returning the canonical stored record.
    fn insert(
        &self,
        table: &str,
        record: Record,
    ) -> impl Future<Output = EngineResult<Record>> + Send;

    /// Replaces the record stored under `id`.
    fn update(
        &self,
        table: &str,
        id: &str,
        record: Record,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Deletes the record stored under `id`.
    fn delete(&self, table: &str, id: &str) -> impl Future<Output = EngineResult<()>> + Send;
}

/// An in-memory remote store for tests.
///
/// Supports scripted failures, an optional hold gate to keep a write
/// in-flight while the test injects remote changes, and optional
/// server-side id assignment for `temp_`-prefixed insert ids.
#[derive(Default)]
pub struct MockRemoteStore {
    tables: Mutex<HashMap<String, BTreeMap<String, Record>>>,
    failures: Mutex<VecDeque<String>>,
    gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
    assign_server_ids: AtomicBool,
    next_server_id: AtomicU64,
}

impl MockRemoteStore {
    /// Creates an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock store that rewrites `temp_`-prefixed insert ids to
    /// server-assigned `rec_{n}` ids.
    #[must_use]
    pub fn with_server_ids() -> Self {
        let store = Self::new();
        store.assign_server_ids.store(true, Ordering::SeqCst);
        store
    }

    /// Queues a failure; the next write fails with this message.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    /// Holds the next write until the returned semaphore gets a permit.
    pub fn hold_next(&self) -> Arc<tokio::sync::Semaphore> {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Returns the record stored under `table`/`id`, if any.
    #[must_use]
    pub fn record(&self, table: &str, id: &str) -> Option<Record> {
        self.tables.lock().get(table)?.get(id).cloned()
    }

    /// Returns the number of records stored in `table`.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, BTreeMap::len)
    }

    async fn enter(&self, table: &str) -> EngineResult<()> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            // Held writes park here until the test releases the permit.
            let _permit = gate.acquire().await;
        }
        match self.failures.lock().pop_front() {
            Some(message) => Err(EngineError::remote(table, message)),
            None => Ok(()),
        }
    }
}

impl RemoteStore for MockRemoteStore {
    async fn insert(&self, table: &str, record: Record) -> EngineResult<Record> {
        self.enter(table).await?;

        let record = if self.assign_server_ids.load(Ordering::SeqCst)
            && record.id().starts_with("temp_")
        {
            let n = self.next_server_id.fetch_add(1, Ordering::SeqCst);
            record.with_id(&format!("rec_{n}"))
        } else {
            record
        };

        self.tables
            .lock()
            .entry(table.to_owned())
            .or_default()
            .insert(record.id().to_owned(), record.clone());
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, record: Record) -> EngineResult<()> {
        self.enter(table).await?;
        self.tables
            .lock()
            .entry(table.to_owned())
            .or_default()
            .insert(id.to_owned(), record);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> EngineResult<()> {
        self.enter(table).await?;
        if let Some(records) = self.tables.lock().get_mut(table) {
            records.remove(id);
        }
        Ok(())
    }
}
