//! Event fan-out.
//!
//! Delivers each event synchronously to every listener on its table, in
//! registration order, then hands the event to the queue processor for
//! archival. A panicking listener is isolated and logged; the remaining
//! listeners still receive the event.

use crate::queue::QueueProcessor;
use crate::registry::SubscriptionRegistry;
use driftsync_model::SyncEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

/// Fans events out to listeners and into the history queue.
#[derive(Clone)]
pub(crate) struct EventBus {
    registry: Arc<SubscriptionRegistry>,
    queue: Arc<QueueProcessor>,
}

impl EventBus {
    pub(crate) fn new(registry: Arc<SubscriptionRegistry>, queue: Arc<QueueProcessor>) -> Self {
        Self { registry, queue }
    }

    /// Delivers `event` to the listeners of its table, then archives it.
    ///
    /// The listener set is snapshotted first, so callbacks are invoked
    /// without any lock held and may subscribe or unsubscribe reentrantly.
    pub(crate) fn emit(&self, event: SyncEvent) {
        let listeners = self.registry.listeners_for(&event.table);
        trace!(
            table = %event.table,
            event_type = ?event.event_type,
            listeners = listeners.len(),
            "emitting event"
        );

        for listener in &listeners {
            if let Some(filter) = &listener.filter {
                if !filter(&event.record) {
                    continue;
                }
            }
            let callback = Arc::clone(&listener.callback);
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                error!(listener = %listener.id, table = %event.table, "listener panicked");
            }
        }

        QueueProcessor::enqueue(&self.queue, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftsync_model::{ChangeKind, Record};
    use driftsync_storage::{MemoryBackend, StorageBackend};
    use parking_lot::Mutex;
    use serde_json::json;

    fn bus() -> (EventBus, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let queue = Arc::new(QueueProcessor::new(storage, 10, 100));
        (EventBus::new(Arc::clone(&registry), queue), registry)
    }

    fn record(id: &str, v: i64) -> Record {
        Record::from_value(json!({"id": id, "v": v})).unwrap()
    }

    fn subscribe_collecting(
        registry: &SubscriptionRegistry,
        table: &str,
        seen: &Arc<Mutex<Vec<String>>>,
    ) {
        let seen = Arc::clone(seen);
        registry
            .subscribe(
                table,
                Arc::new(move |event: &SyncEvent| seen.lock().push(event.record.id().to_owned())),
                None,
                || Ok(Box::new(NoopHandle)),
            )
            .unwrap();
    }

    struct NoopHandle;
    impl crate::bridge::BridgeHandle for NoopHandle {
        fn close(&mut self) {}
    }

    #[test]
    fn delivers_to_table_listeners_only() {
        let (bus, registry) = bus();
        let widgets = Arc::new(Mutex::new(Vec::new()));
        let orders = Arc::new(Mutex::new(Vec::new()));
        subscribe_collecting(&registry, "widgets", &widgets);
        subscribe_collecting(&registry, "orders", &orders);

        bus.emit(SyncEvent::local(
            ChangeKind::Insert,
            "widgets",
            record("w1", 1),
        ));

        assert_eq!(widgets.lock().as_slice(), ["w1"]);
        assert!(orders.lock().is_empty());
    }

    #[test]
    fn filter_gates_delivery() {
        let (bus, registry) = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registry
            .subscribe(
                "widgets",
                Arc::new(move |event: &SyncEvent| {
                    sink.lock().push(event.record.id().to_owned());
                }),
                Some(Arc::new(|record: &Record| {
                    record.get("v") == Some(&json!(2))
                })),
                || Ok(Box::new(NoopHandle)),
            )
            .unwrap();

        bus.emit(SyncEvent::local(
            ChangeKind::Insert,
            "widgets",
            record("w1", 1),
        ));
        bus.emit(SyncEvent::local(
            ChangeKind::Insert,
            "widgets",
            record("w2", 2),
        ));

        assert_eq!(seen.lock().as_slice(), ["w2"]);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let (bus, registry) = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry
            .subscribe(
                "widgets",
                Arc::new(|_: &SyncEvent| panic!("listener bug")),
                None,
                || Ok(Box::new(NoopHandle)),
            )
            .unwrap();
        subscribe_collecting(&registry, "widgets", &seen);

        bus.emit(SyncEvent::local(
            ChangeKind::Insert,
            "widgets",
            record("w1", 1),
        ));

        assert_eq!(seen.lock().as_slice(), ["w1"]);
    }

    #[test]
    fn delivery_preserves_emission_order() {
        let (bus, registry) = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        subscribe_collecting(&registry, "widgets", &seen);

        for i in 0..5 {
            bus.emit(SyncEvent::local(
                ChangeKind::Update,
                "widgets",
                record(&format!("w{i}"), i),
            ));
        }

        assert_eq!(seen.lock().as_slice(), ["w0", "w1", "w2", "w3", "w4"]);
    }

    #[test]
    fn listener_may_unsubscribe_reentrantly() {
        let (bus, registry) = bus();
        let registry_handle = Arc::clone(&registry);
        let id_slot = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&id_slot);
        let id = registry
            .subscribe(
                "widgets",
                Arc::new(move |_: &SyncEvent| {
                    if let Some(id) = slot.lock().take() {
                        registry_handle.unsubscribe(id);
                    }
                }),
                None,
                || Ok(Box::new(NoopHandle)),
            )
            .unwrap();
        *id_slot.lock() = Some(id);

        bus.emit(SyncEvent::local(
            ChangeKind::Insert,
            "widgets",
            record("w1", 1),
        ));
        assert_eq!(registry.listener_count(), 0);
    }
}
