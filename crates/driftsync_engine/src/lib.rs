//! # DriftSync Engine
//!
//! A real-time synchronization engine that reconciles optimistic local
//! mutations against a remote data store, detects write-write conflicts,
//! and fans change notifications out to many independent observers.
//!
//! This crate provides:
//! - Subscription registry with one change-bridge subscription per table
//! - Synchronous event fan-out with per-listener filters and panic isolation
//! - Optimistic update coordinator with rollback and compensating events
//! - Conflict detection against pending local operations, with a durable
//!   conflict store and explicit resolution strategies
//! - A cooperative queue processor archiving every event to bounded history
//!
//! ## Architecture
//!
//! Local mutations flow through [`SyncEngine::insert`], [`SyncEngine::update`]
//! and [`SyncEngine::delete`]: the pending snapshot is recorded, a local
//! event is emitted immediately (the optimistic update), then the remote
//! write is awaited. Remote changes
//! arrive through a [`ChangeBridge`] sink and are checked against the
//! pending operations before being applied; a hit inside the conflict
//! window becomes a [`driftsync_model::SyncConflict`] instead of an event.
//!
//! ## Key Invariants
//!
//! - Exactly one bridge subscription per table with at least one listener
//! - At most one pending entry per record id; local last-writer-wins
//! - Per-table delivery order matches emission order
//! - Every rollback pairs with a compensating event
//! - Conflicts are never deleted, only marked resolved

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod bus;
mod config;
mod conflict;
mod coordinator;
mod engine;
mod error;
mod pending;
mod queue;
mod registry;
mod remote;
mod stats;

pub use bridge::{BridgeHandle, ChangeBridge, MockBridge, RemoteChange, RemoteSink};
pub use config::EngineConfig;
pub use conflict::BatchResolution;
pub use engine::SyncEngine;
pub use error::{EngineError, EngineResult};
pub use remote::{MockRemoteStore, RemoteStore};
pub use stats::StatsSnapshot;

pub use driftsync_model::{
    ChangeKind, ConflictId, EventId, EventSource, EventType, Identifiable, ListenerId,
    OperationId, Record, Resolution, SyncConflict, SyncEvent,
};
