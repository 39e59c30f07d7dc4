//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored key could not be decoded back to a string.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The key is not usable by this backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
