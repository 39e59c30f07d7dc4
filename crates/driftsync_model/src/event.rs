//! Sync events.

use crate::ids::EventId;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The mutation verbs shared by the optimistic path and the change bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A new record is created.
    Insert,
    /// An existing record is replaced.
    Update,
    /// A record is removed.
    Delete,
}

impl ChangeKind {
    /// Maps this mutation verb to the event type it emits.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            ChangeKind::Insert => EventType::Insert,
            ChangeKind::Update => EventType::Update,
            ChangeKind::Delete => EventType::Delete,
        }
    }
}

/// Type of sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A record was inserted.
    Insert,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
    /// A reconciliation signal, e.g. a server-assigned id replacing a
    /// temporary local one, or a prompt to re-fetch after a failed rollback.
    Sync,
    /// A write-write conflict was detected; the remote change is held
    /// pending resolution.
    Conflict,
}

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Produced by an optimistic local mutation.
    Local,
    /// Produced by the change bridge.
    Remote,
}

/// One observed change.
///
/// Events are created, delivered to listeners, and archived to the history
/// store; they are never mutated. Every event carries a non-empty table
/// name and a record with a valid id (guaranteed by [`Record`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Unique event id.
    pub id: EventId,
    /// What happened.
    pub event_type: EventType,
    /// Logical collection name.
    pub table: String,
    /// The current record payload.
    pub record: Record,
    /// Previous payload, present for updates/deletes from the remote side
    /// and for compensating events.
    pub old_record: Option<Record>,
    /// Wall-clock milliseconds at emission.
    pub timestamp_ms: u64,
    /// Local or remote origin.
    pub source: EventSource,
}

impl SyncEvent {
    /// Creates an event with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        event_type: EventType,
        table: impl Into<String>,
        record: Record,
        old_record: Option<Record>,
        source: EventSource,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            table: table.into(),
            record,
            old_record,
            timestamp_ms: now_ms(),
            source,
        }
    }

    /// Creates a locally-sourced event for an optimistic mutation.
    #[must_use]
    pub fn local(kind: ChangeKind, table: impl Into<String>, record: Record) -> Self {
        Self::new(kind.event_type(), table, record, None, EventSource::Local)
    }

    /// Creates a remotely-sourced event from a bridge change.
    #[must_use]
    pub fn remote(
        kind: ChangeKind,
        table: impl Into<String>,
        record: Record,
        old_record: Option<Record>,
    ) -> Self {
        Self::new(kind.event_type(), table, record, old_record, EventSource::Remote)
    }

    /// Creates a conflict event holding both snapshots.
    ///
    /// `record` is the remote snapshot being held back; `local_record` is
    /// the pending local snapshot it collided with.
    #[must_use]
    pub fn conflict(table: impl Into<String>, record: Record, local_record: Record) -> Self {
        Self::new(
            EventType::Conflict,
            table,
            record,
            Some(local_record),
            EventSource::Remote,
        )
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
