//! # Entwatch Source
//!
//! Record model and read contract for entwatch entity sources.
//!
//! This crate provides:
//! - `EntityRecord` and the typed `FieldValue` model
//! - The `EntitySource` read contract (modified-since and initial fetch)
//! - `MemorySource` for tests and in-process demos
//!
//! This is a pure data/contract crate with no scheduling logic. The
//! engine crate consumes these types to diff successive observations of
//! a backing store that offers no push primitive.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod memory;
mod model;
mod source;

pub use memory::MemorySource;
pub use model::{EntityId, EntityRecord, FieldValue, UserRef};
pub use source::{EntitySource, SourceError, SourceResult};
