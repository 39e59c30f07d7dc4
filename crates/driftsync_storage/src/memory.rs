//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral engines that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use driftsync_storage::{StorageBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.set("conflict/1", b"payload").unwrap();
/// assert_eq!(backend.get("conflict/1").unwrap(), Some(b"payload".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the backend holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears all data from the backend.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        self.entries.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> StorageResult<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // BTreeMap iteration is already lexicographic.
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());
        assert_eq!(backend.get("missing").unwrap(), None);
    }

    #[test]
    fn memory_set_then_get() {
        let backend = MemoryBackend::new();
        backend.set("a", b"one").unwrap();
        backend.set("b", b"two").unwrap();

        assert_eq!(backend.get("a").unwrap(), Some(b"one".to_vec()));
        assert_eq!(backend.get("b").unwrap(), Some(b"two".to_vec()));
        assert_eq!(backend.len(), 2);
    }

    #[test]
    fn memory_set_overwrites() {
        let backend = MemoryBackend::new();
        backend.set("a", b"old").unwrap();
        backend.set("a", b"new").unwrap();

        assert_eq!(backend.get("a").unwrap(), Some(b"new".to_vec()));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn memory_empty_key_rejected() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.set("", b"x"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn memory_remove_absent_is_noop() {
        let backend = MemoryBackend::new();
        backend.remove("ghost").unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn memory_remove_many() {
        let backend = MemoryBackend::new();
        backend.set("a", b"1").unwrap();
        backend.set("b", b"2").unwrap();
        backend.set("c", b"3").unwrap();

        backend
            .remove_many(&["a".into(), "c".into(), "ghost".into()])
            .unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn memory_list_keys_sorted_by_prefix() {
        let backend = MemoryBackend::new();
        backend.set("history/002", b"").unwrap();
        backend.set("history/001", b"").unwrap();
        backend.set("conflict/9", b"").unwrap();

        let keys = backend.list_keys("history/").unwrap();
        assert_eq!(keys, vec!["history/001".to_owned(), "history/002".to_owned()]);

        let all = backend.list_keys("").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], "conflict/9");
    }

    #[test]
    fn memory_clear() {
        let backend = MemoryBackend::new();
        backend.set("a", b"1").unwrap();
        backend.clear();
        assert!(backend.is_empty());
    }
}
