//! Session engine for SessionDB
//!
//! This crate ties the engine adapter and the lock registry together:
//! - SessionStore: guarded single-key and batch read-modify-write
//! - Batch: multi-session mutation descriptor
//! - Lifecycle: create, extend, delete, eviction, expiry sweep
//! - Labels: label edits, label queries, filtered listing
//! - Sweeper: background thread running the sweep on an interval
//! - StoreConfig: TOML-loadable store settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod labels;
pub mod lifecycle;
pub mod store;
pub mod sweeper;

pub use batch::Batch;
pub use config::{CapacityPolicy, StoreConfig};
pub use labels::{SessionFilter, SessionStatus, LABELS_FIELD};
pub use lifecycle::SweepReport;
pub use sessiondb_storage::DurabilityMode;
pub use store::{SessionStats, SessionStore};
pub use sweeper::Sweeper;
