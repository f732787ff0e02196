//! # Entwatch Engine
//!
//! Near-real-time change semantics over a backing store that exposes no
//! push or subscribe primitive.
//!
//! This crate provides:
//! - Keyed snapshot store of last-observed entity state
//! - Snapshot diffing with field-level change classification
//! - Subscription registry with per-entity filtering
//! - Single-flight poll scheduler on a cancellable ticker thread
//!
//! ## Architecture
//!
//! The engine periodically asks each configured [`EntitySource`] for
//! records modified since the previous cycle, diffs every record
//! against its snapshot, overwrites the snapshot, and fans the
//! resulting [`ChangeEvent`]s out to matching subscriptions.
//!
//! ## Key Invariants
//!
//! - At most one poll cycle runs at a time; overlapping triggers are
//!   dropped, never queued
//! - One snapshot per `(entity type, entity id)`; snapshots are
//!   overwritten whole, never partially
//! - A failure in one entity type or one subscriber never aborts the
//!   rest of a cycle
//! - Events within one entity type are emitted oldest-modified first
//!
//! [`EntitySource`]: entwatch_source::EntitySource

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod detect;
mod engine;
mod error;
mod snapshot;
mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigPatch, EngineConfig};
pub use detect::{classify, ChangeEvent, ChangeKind, STATUS_FIELD};
pub use engine::{ChangeEngine, EngineStats, EngineStatus};
pub use error::{EngineError, EngineResult};
pub use snapshot::EntitySnapshot;
pub use subscription::{
    ChangeCallback, Dispatcher, IdGenerator, SequentialIds, SubscriptionId, SubscriptionRegistry,
};
