//! Storage backend trait definition.

use crate::error::StorageResult;

/// A durable key/value store for DriftSync.
///
/// Storage backends are **opaque byte stores** keyed by strings. The engine
/// owns all value interpretation - backends do not understand conflicts,
/// events, or records.
///
/// # Invariants
///
/// - `get` returns exactly the bytes previously passed to `set` for that key
/// - `set` overwrites any existing value for the key
/// - `list_keys` returns keys in lexicographic order
/// - `remove` of an absent key is a no-op
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or an I/O error occurs.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// Removing an absent key succeeds silently.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Removes all values stored under `keys`.
    ///
    /// Absent keys are skipped; the operation is best-effort in the sense
    /// that all keys are attempted even if one fails, with the first error
    /// returned afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, after attempting every key.
    fn remove_many(&self, keys: &[String]) -> StorageResult<()>;

    /// Lists all keys starting with `prefix`, in lexicographic order.
    ///
    /// An empty prefix lists every key.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or a stored key cannot
    /// be decoded.
    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;
}
