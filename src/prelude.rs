//! Convenient imports for SessionDB.
//!
//! ```
//! use sessiondb::prelude::*;
//!
//! let db = SessionDb::ephemeral()?;
//! # Ok::<(), sessiondb::Error>(())
//! ```

// Main entry point
pub use crate::database::{SessionDb, SessionDbBuilder};

// Error handling
pub use sessiondb_core::{Error, Result};

// Data model
pub use sessiondb_core::{Deadline, Payload, SessionKey, SessionRecord};

// Store operations
pub use sessiondb_engine::{
    Batch, CapacityPolicy, DurabilityMode, SessionFilter, SessionStats, SessionStatus, StoreConfig,
    SweepReport,
};

// Coercion helpers
pub use sessiondb_core::coerce;

// Re-export serde_json for convenience
pub use serde_json::json;
