//! # DriftSync Model
//!
//! Shared data model and persistence codecs for DriftSync.
//!
//! This crate provides:
//! - [`Record`] - an opaque, id-carrying record payload
//! - [`SyncEvent`] - one observed change, local or remote
//! - [`SyncConflict`] - an unresolved divergence between local and remote
//! - [`ChangeKind`] / [`EventType`] / [`EventSource`] - change taxonomy
//! - Typed ids ([`EventId`], [`ListenerId`], [`OperationId`], [`ConflictId`])
//! - CBOR [`codec`] helpers for durable persistence
//!
//! The model is table-agnostic and record-shape-agnostic: a [`Record`] is
//! any JSON object with a non-empty string `id` field. Typed application
//! structs plug in through the [`Identifiable`] trait.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod conflict;
mod error;
mod event;
mod ids;
mod record;

pub use conflict::{Resolution, SyncConflict};
pub use error::{ModelError, ModelResult};
pub use event::{ChangeKind, EventSource, EventType, SyncEvent};
pub use ids::{ConflictId, EventId, ListenerId, OperationId};
pub use record::{Identifiable, Record};
