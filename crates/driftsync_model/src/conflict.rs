//! Conflict representation and resolution strategies.

use crate::event::now_ms;
use crate::ids::ConflictId;
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// How a conflict is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Keep the local snapshot.
    Local,
    /// Adopt the remote snapshot.
    Remote,
    /// Merge the snapshots, local fields taking precedence unless an
    /// explicit merged record is supplied.
    Merge,
}

/// An unresolved divergence between a pending local operation and an
/// incoming remote change on the same record.
///
/// A conflict transitions exactly once to resolved and is never deleted;
/// resolved conflicts remain in the store as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Unique conflict id.
    pub id: ConflictId,
    /// Logical collection name.
    pub table: String,
    /// The pending local snapshot at detection time.
    pub local_record: Record,
    /// The remote snapshot that was held back.
    pub remote_record: Record,
    /// Wall-clock milliseconds at detection.
    pub timestamp_ms: u64,
    /// Whether the conflict has been resolved.
    pub resolved: bool,
    /// The strategy used, set once resolved.
    pub resolution: Option<Resolution>,
}

impl SyncConflict {
    /// Creates a new unresolved conflict.
    #[must_use]
    pub fn new(table: impl Into<String>, local_record: Record, remote_record: Record) -> Self {
        Self {
            id: ConflictId::new(),
            table: table.into(),
            local_record,
            remote_record,
            timestamp_ms: now_ms(),
            resolved: false,
            resolution: None,
        }
    }

    /// Returns the id of the record both snapshots describe.
    #[must_use]
    pub fn record_id(&self) -> &str {
        self.local_record.id()
    }

    /// Marks the conflict as resolved with the given strategy.
    pub fn mark_resolved(&mut self, resolution: Resolution) {
        self.resolved = true;
        self.resolution = Some(resolution);
    }

    /// Computes the record a resolution strategy produces.
    ///
    /// For [`Resolution::Merge`], `merged` is used when supplied, otherwise
    /// the snapshots are shallow-merged with local fields winning.
    #[must_use]
    pub fn resolved_record(&self, resolution: Resolution, merged: Option<Record>) -> Record {
        match resolution {
            Resolution::Local => self.local_record.clone(),
            Resolution::Remote => self.remote_record.clone(),
            Resolution::Merge => {
                merged.unwrap_or_else(|| self.local_record.merged_over(&self.remote_record))
            }
        }
    }
}
