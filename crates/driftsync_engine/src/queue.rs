//! Event history queue.
//!
//! Every emitted event is appended to an in-memory queue and archived to
//! durable storage by a background drain. The drain works in bounded
//! batches with a cooperative yield between them, so a burst of events
//! never monopolizes the runtime. History is capped; the oldest entries
//! are evicted first.

use driftsync_model::{codec, SyncEvent};
use driftsync_storage::StorageBackend;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const HISTORY_PREFIX: &str = "history/";

fn history_key(seq: u64) -> String {
    // Zero-padded so lexicographic key order equals append order.
    format!("{HISTORY_PREFIX}{seq:020}")
}

/// Archives emitted events to bounded durable history.
pub(crate) struct QueueProcessor {
    queue: Mutex<VecDeque<SyncEvent>>,
    drain_scheduled: AtomicBool,
    storage: Arc<dyn StorageBackend>,
    next_seq: AtomicU64,
    batch_size: usize,
    history_cap: usize,
}

impl QueueProcessor {
    /// Creates a processor over `storage`, resuming the sequence counter
    /// from any history already present.
    pub(crate) fn new(
        storage: Arc<dyn StorageBackend>,
        batch_size: usize,
        history_cap: usize,
    ) -> Self {
        let next_seq = storage
            .list_keys(HISTORY_PREFIX)
            .ok()
            .and_then(|keys| {
                keys.iter()
                    .filter_map(|k| k.strip_prefix(HISTORY_PREFIX)?.parse::<u64>().ok())
                    .max()
            })
            .map_or(0, |max| max + 1);

        Self {
            queue: Mutex::new(VecDeque::new()),
            drain_scheduled: AtomicBool::new(false),
            storage,
            next_seq: AtomicU64::new(next_seq),
            batch_size,
            history_cap,
        }
    }

    /// Appends an event and schedules a drain.
    ///
    /// Inside a tokio runtime the drain runs as a spawned task; otherwise
    /// it runs inline so events are never stranded in the queue.
    pub(crate) fn enqueue(queue: &Arc<Self>, event: SyncEvent) {
        queue.queue.lock().push_back(event);

        if queue
            .drain_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // A drain is already scheduled; it will pick this event up.
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = Arc::clone(queue);
                handle.spawn(async move {
                    queue.drain_loop().await;
                });
            }
            Err(_) => {
                queue.drain_inline();
            }
        }
    }

    async fn drain_loop(&self) {
        loop {
            while self.drain_tick() > 0 {
                tokio::task::yield_now().await;
            }
            self.drain_scheduled.store(false, Ordering::SeqCst);
            // An enqueue may have raced with the flag clear; recheck and
            // reclaim the flag rather than strand its event.
            if self.queue.lock().is_empty()
                || self
                    .drain_scheduled
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                return;
            }
        }
    }

    fn drain_inline(&self) {
        while self.drain_tick() > 0 {}
        self.drain_scheduled.store(false, Ordering::SeqCst);
    }

    /// Archives one batch, returning the number of events taken.
    fn drain_tick(&self) -> usize {
        let batch: Vec<SyncEvent> = {
            let mut queue = self.queue.lock();
            let take = queue.len().min(self.batch_size);
            queue.drain(..take).collect()
        };

        for event in &batch {
            self.archive(event);
        }
        if !batch.is_empty() {
            debug!(archived = batch.len(), "drained event batch");
        }
        batch.len()
    }

    /// Persists one event and evicts beyond the cap. Persistence failures
    /// are logged and swallowed; history is best-effort and must never
    /// break event delivery.
    fn archive(&self, event: &SyncEvent) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let bytes = match codec::encode(event) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, "failed to encode event for history");
                return;
            }
        };
        if let Err(error) = self.storage.set(&history_key(seq), &bytes) {
            warn!(%error, "failed to persist event history");
            return;
        }
        self.evict_over_cap();
    }

    fn evict_over_cap(&self) {
        let keys = match self.storage.list_keys(HISTORY_PREFIX) {
            Ok(keys) => keys,
            Err(error) => {
                warn!(%error, "failed to list event history");
                return;
            }
        };
        if keys.len() <= self.history_cap {
            return;
        }
        let excess = keys.len() - self.history_cap;
        let oldest: Vec<String> = keys.into_iter().take(excess).collect();
        if let Err(error) = self.storage.remove_many(&oldest) {
            warn!(%error, "failed to evict event history");
        }
    }

    /// Drains everything synchronously. Used on shutdown.
    pub(crate) fn drain_all(&self) {
        while self.drain_tick() > 0 {}
    }

    /// Returns the number of events waiting to be archived.
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Reads up to `limit` archived events, oldest first.
    pub(crate) fn history(&self, limit: usize) -> Vec<SyncEvent> {
        let keys = match self.storage.list_keys(HISTORY_PREFIX) {
            Ok(keys) => keys,
            Err(error) => {
                warn!(%error, "failed to list event history");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for key in keys.iter().take(limit) {
            match self.storage.get(key) {
                Ok(Some(bytes)) => match codec::decode(&bytes) {
                    Ok(event) => events.push(event),
                    Err(error) => warn!(%error, key, "skipping undecodable history entry"),
                },
                Ok(None) => {}
                Err(error) => warn!(%error, key, "failed to read history entry"),
            }
        }
        events
    }
}
