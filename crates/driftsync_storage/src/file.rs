//! File-backed storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// A file-backed storage backend.
///
/// Each key is stored as one file in the root directory. File names are the
/// lowercase hex encoding of the key's UTF-8 bytes, so keys may contain any
/// character (including `/`, which DriftSync uses as a namespace separator).
///
/// Writes go through a temporary file followed by a rename, so a crash
/// mid-write leaves the previous value intact.
///
/// # Example
///
/// ```rust,no_run
/// use driftsync_storage::{StorageBackend, FileBackend};
///
/// let backend = FileBackend::open("/var/lib/driftsync").unwrap();
/// backend.set("conflict/42", b"payload").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    // Serializes writers; readers go straight to the filesystem.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Opens a file backend rooted at `root`, creating the directory
    /// if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory of this backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(hex_encode(key.as_bytes()))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        let _guard = self.write_lock.lock();
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn remove_many(&self, keys: &[String]) -> StorageResult<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(err) = self.remove(key) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Skip leftover temporary files from interrupted writes.
            if name.ends_with(".tmp") {
                continue;
            }
            let bytes = hex_decode(name)
                .ok_or_else(|| StorageError::Corrupted(format!("bad file name: {name}")))?;
            let key = String::from_utf8(bytes)
                .map_err(|_| StorageError::Corrupted(format!("non-UTF-8 key: {name}")))?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_backend() -> (TempDir, FileBackend) {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn file_set_then_get() {
        let (_dir, backend) = open_backend();
        backend.set("conflict/1", b"payload").unwrap();

        assert_eq!(
            backend.get("conflict/1").unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(backend.get("conflict/2").unwrap(), None);
    }

    #[test]
    fn file_set_overwrites() {
        let (_dir, backend) = open_backend();
        backend.set("k", b"old").unwrap();
        backend.set("k", b"new").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn file_remove_and_remove_many() {
        let (_dir, backend) = open_backend();
        backend.set("a", b"1").unwrap();
        backend.set("b", b"2").unwrap();

        backend.remove("a").unwrap();
        backend.remove("a").unwrap(); // absent key is a no-op
        backend.remove_many(&["b".into(), "ghost".into()]).unwrap();

        assert_eq!(backend.list_keys("").unwrap().len(), 0);
    }

    #[test]
    fn file_list_keys_sorted_by_prefix() {
        let (_dir, backend) = open_backend();
        backend.set("history/00000002", b"").unwrap();
        backend.set("history/00000001", b"").unwrap();
        backend.set("conflict/x", b"").unwrap();

        let keys = backend.list_keys("history/").unwrap();
        assert_eq!(
            keys,
            vec![
                "history/00000001".to_owned(),
                "history/00000002".to_owned()
            ]
        );
    }

    #[test]
    fn file_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.set("conflict/persisted", b"still here").unwrap();
        }
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(
            backend.get("conflict/persisted").unwrap(),
            Some(b"still here".to_vec())
        );
    }

    #[test]
    fn hex_roundtrip() {
        let key = "history/0042 with spaces and ünïcode";
        let encoded = hex_encode(key.as_bytes());
        let decoded = hex_decode(&encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), key);
    }

    #[test]
    fn hex_decode_rejects_garbage() {
        assert_eq!(hex_decode("zz"), None);
        assert_eq!(hex_decode("abc"), None);
    }
}
