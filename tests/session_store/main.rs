//! Session Store Test Suite
//!
//! End-to-end tests through the `SessionDb` facade, focused on behavior
//! under concurrency:
//!
//! 1. Concurrent single-key updates serialize
//! 2. Batches are all-or-nothing and never deadlock
//! 3. Delete and sweep remove records and their locks
//! 4. Committed sessions survive reopening the file
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test session_store
//! cargo test --test session_store batch::
//! ```

use sessiondb::prelude::*;
use std::time::Duration;

// Test modules
pub mod batch;
pub mod durability;
pub mod lifecycle;
pub mod sweep;
pub mod updates;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// In-memory database without the background sweeper
pub fn create_db() -> SessionDb {
    SessionDb::builder()
        .no_sweeper()
        .open()
        .expect("Failed to create ephemeral database")
}

/// Build a payload from a JSON object literal
pub fn payload(value: serde_json::Value) -> Payload {
    value
        .as_object()
        .cloned()
        .expect("payload must be a JSON object")
}

/// Mutation adding one to the `count` field
pub fn increment(p: &mut Payload) -> Result<()> {
    let n = coerce::field_int(p, "count");
    p.insert("count".into(), json!(n + 1));
    Ok(())
}

/// Current `count` of a stored session
pub fn count_of(db: &SessionDb, key: &str) -> i64 {
    let record = db.get(key).unwrap().expect("session must exist");
    coerce::field_int(&record.payload, "count")
}

/// A TTL that has certainly passed once `settle()` returns
pub const SHORT_TTL: Duration = Duration::from_millis(20);

/// Wait out `SHORT_TTL`
pub fn settle() {
    std::thread::sleep(SHORT_TTL * 3);
}
