//! Store configuration
//!
//! [`StoreConfig`] is read from TOML, every field optional:
//!
//! ```toml
//! path = "/var/lib/sessiondb/sessions.redb"
//! durability = "immediate"
//! lock_timeout_ms = 5000
//! sweep_interval_ms = 60000
//! default_ttl_secs = 3600
//! max_sessions = 100000
//! capacity_policy = "evict_oldest"
//! ```

use serde::{Deserialize, Serialize};
use sessiondb_core::{Error, Result};
use sessiondb_storage::DurabilityMode;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on a single lock wait
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default period of the background sweep
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// What `create` and `upsert` do once `max_sessions` is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Fail with `CapacityExceeded`
    #[default]
    Reject,
    /// Delete the least recently updated session to make room
    EvictOldest,
}

/// Configuration for a [`SessionStore`](crate::SessionStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file; `None` keeps everything in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Commit durability
    pub durability: DurabilityMode,

    /// How long a guarded operation waits for each session lock
    pub lock_timeout_ms: u64,

    /// Period of the background sweep; 0 disables the sweeper
    pub sweep_interval_ms: u64,

    /// TTL given to sessions created by `upsert`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,

    /// Maximum number of stored sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,

    /// Behaviour at `max_sessions`
    pub capacity_policy: CapacityPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: None,
            durability: DurabilityMode::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            default_ttl_secs: None,
            max_sessions: None,
            capacity_policy: CapacityPolicy::Reject,
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::Config("lock_timeout_ms must be positive".into()));
        }
        if self.default_ttl_secs == Some(0) {
            return Err(Error::Config("default_ttl_secs must be positive".into()));
        }
        if self.max_sessions == Some(0) {
            return Err(Error::Config("max_sessions must be positive".into()));
        }
        if matches!(&self.path, Some(p) if p.as_os_str().is_empty()) {
            return Err(Error::Config("path must not be empty".into()));
        }
        Ok(())
    }

    /// Lock wait bound as a `Duration`
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Sweep period, `None` when the sweeper is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }

    /// TTL for sessions created implicitly
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}
