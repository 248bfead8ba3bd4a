//! Storage layer for SessionDB
//!
//! This crate adapts the embedded transactional engine:
//! - Engine: file-backed or in-memory engine handle
//! - EngineTxn: get/put/delete scoped to one atomic transaction
//! - DurabilityMode: how far a commit reaches stable storage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durability;
pub mod engine;

pub use durability::DurabilityMode;
pub use engine::{Engine, EngineTxn};
