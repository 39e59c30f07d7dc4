//! Error types for the sync engine.

use driftsync_model::{ConflictId, ModelError};
use driftsync_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The change bridge rejected a subscription. No partial listener is
    /// registered when this is returned.
    #[error("bridge subscription failed: {0}")]
    Bridge(String),

    /// A remote write failed. The optimistic update has been rolled back
    /// and a compensating event emitted before this is returned.
    #[error("remote write failed on table {table}: {message}")]
    Remote {
        /// The table the write targeted.
        table: String,
        /// What the remote store reported.
        message: String,
    },

    /// Durable storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Encoding or decoding persisted state failed.
    #[error("codec error: {0}")]
    Codec(#[from] ModelError),

    /// The conflict id is not known to the conflict store.
    #[error("conflict {0} not found")]
    ConflictNotFound(ConflictId),

    /// The conflict was already resolved; resolution happens exactly once.
    #[error("conflict {0} is already resolved")]
    ConflictAlreadyResolved(ConflictId),
}

impl EngineError {
    /// Creates a remote write error.
    pub fn remote(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            table: table.into(),
            message: message.into(),
        }
    }
}
