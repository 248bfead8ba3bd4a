//! Durability mode for engine commits.
//!
//! Defines how far a committed transaction has reached stable storage
//! when `commit` returns.

use serde::{Deserialize, Serialize};

/// Durability mode for committed transactions.
///
/// Controls when data is fsynced to disk and the trade-off between
/// commit latency and crash safety.
///
/// # Mode Comparison
///
/// | Mode | fsync | Survives crash | Use Case |
/// |------|-------|----------------|----------|
/// | None | never | no | Tests, scratch stores |
/// | Eventual | deferred | up to last durable commit | High write volume |
/// | Immediate | every commit | yes | Production (default) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// No durability - commits are visible but never forced to disk.
    ///
    /// Data written in this mode is only persisted by a later
    /// `Immediate` commit.
    None,

    /// Commits are persisted lazily.
    ///
    /// A crash may lose the most recent commits but never leaves a
    /// partially applied transaction.
    Eventual,

    /// fsync on every commit (slowest, maximum durability).
    Immediate,
}

impl DurabilityMode {
    /// Check if this mode forces every commit to stable storage.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Immediate)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::None => "No durability (fastest, recent data lost on crash)",
            DurabilityMode::Eventual => "Deferred fsync (balanced speed/safety)",
            DurabilityMode::Immediate => "fsync per commit (safest, slowest)",
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Immediate
    }
}

impl From<DurabilityMode> for redb::Durability {
    fn from(mode: DurabilityMode) -> Self {
        match mode {
            DurabilityMode::None => redb::Durability::None,
            DurabilityMode::Eventual => redb::Durability::Eventual,
            DurabilityMode::Immediate => redb::Durability::Immediate,
        }
    }
}
