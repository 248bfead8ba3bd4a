//! Concurrency layer for SessionDB
//!
//! This crate implements per-session mutual exclusion:
//! - LockRegistry: lazily created lock per session key, explicit forget
//! - KeyGuard: exclusive hold on one key, released on drop
//! - LockSet: several keys locked in ascending key order
//!
//! All lock waits are bounded by a [`Deadline`](sessiondb_core::Deadline).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lockset;
pub mod registry;

pub use lockset::LockSet;
pub use registry::{KeyGuard, LockRegistry};
