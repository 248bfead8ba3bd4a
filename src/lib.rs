//! # SessionDB
//!
//! Embedded, concurrency-safe session state store for multi-tool servers.
//!
//! Many worker threads read and mutate the same sessions at once. SessionDB
//! serializes mutations of one session, runs mutations of different
//! sessions in parallel, and commits every change through an embedded
//! transactional engine.
//!
//! ## Quick Start
//!
//! ```
//! use sessiondb::prelude::*;
//!
//! let db = SessionDb::ephemeral()?;
//! db.create("s1", Payload::new(), None)?;
//!
//! // Read-modify-write under the session's lock
//! db.update("s1", |p| {
//!     let n = coerce::field_int(p, "steps");
//!     p.insert("steps".into(), json!(n + 1));
//!     Ok(())
//! })?;
//!
//! // Several sessions, all or nothing
//! db.create("s2", Payload::new(), None)?;
//! db.batch_update(
//!     Batch::new()
//!         .update("s1", |p| { p.insert("peer".into(), json!("s2")); Ok(()) })
//!         .update("s2", |p| { p.insert("peer".into(), json!("s1")); Ok(()) }),
//! )?;
//!
//! db.delete("s2")?;
//! db.close();
//! # Ok::<(), sessiondb::Error>(())
//! ```
//!
//! ## Crates
//!
//! - `sessiondb-core` - error taxonomy, data model, coercion helpers
//! - `sessiondb-storage` - embedded engine adapter
//! - `sessiondb-concurrency` - per-session lock registry
//! - `sessiondb-engine` - session store, lifecycle, sweeper

#![warn(missing_docs)]

mod database;

pub mod prelude;

// Re-export main entry points
pub use database::{SessionDb, SessionDbBuilder};
pub use sessiondb_core::{coerce, Deadline, Error, Payload, Result, SessionKey, SessionRecord};
pub use sessiondb_engine::{
    Batch, CapacityPolicy, DurabilityMode, SessionFilter, SessionStats, SessionStatus,
    SessionStore, StoreConfig, SweepReport, Sweeper,
};
