//! Core types for SessionDB
//!
//! This crate defines the shared vocabulary used by every other crate:
//! - [`Error`] / [`Result`]: the store's error taxonomy
//! - [`SessionKey`], [`SessionRecord`], [`Payload`]: the persisted data model
//! - [`Deadline`]: the time budget carried by every guarded operation
//! - [`coerce`]: best-effort normalizers for loosely typed payload fields
//! - [`codec`]: the on-disk record encoding

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod coerce;
pub mod deadline;
pub mod error;
pub mod types;

pub use deadline::Deadline;
pub use error::{Error, Result};
pub use types::{Payload, SessionKey, SessionRecord, MAX_KEY_LEN};

// Payload documents are plain JSON objects
pub use serde_json::{json, Value};
