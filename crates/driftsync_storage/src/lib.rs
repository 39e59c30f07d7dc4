//! # DriftSync Storage
//!
//! Durable key/value storage backends for DriftSync.
//!
//! The sync engine persists its conflict store and bounded event history
//! through the [`StorageBackend`] trait. Backends are **opaque byte stores**
//! keyed by UTF-8 strings; they do not interpret the values they hold.
//!
//! Two implementations are provided:
//! - [`MemoryBackend`] for tests and ephemeral engines
//! - [`FileBackend`] for persistence across process restarts

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
