//! Main database entry point for SessionDB.
//!
//! This module provides the `SessionDb` struct: a [`SessionStore`] plus
//! the background sweeper configured for it.

use chrono::Utc;
use parking_lot::Mutex;
use sessiondb_core::Result;
use sessiondb_engine::{CapacityPolicy, DurabilityMode, SessionStore, StoreConfig, Sweeper};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The SessionDB database.
///
/// Dereferences to [`SessionStore`], so every store operation is available
/// directly on the database. Create one with [`SessionDb::open`],
/// [`SessionDb::ephemeral`] or [`SessionDb::builder`].
///
/// # Example
///
/// ```
/// use sessiondb::prelude::*;
///
/// let db = SessionDb::ephemeral()?;
/// db.create("s1", Payload::new(), None)?;
/// let record = db.update("s1", |p| {
///     p.insert("stage".into(), json!("build"));
///     Ok(())
/// })?;
/// assert_eq!(record.version, 2);
///
/// db.close();
/// # Ok::<(), sessiondb::Error>(())
/// ```
pub struct SessionDb {
    store: Arc<SessionStore>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl SessionDb {
    /// Open a database file with default settings.
    ///
    /// Commits are fsynced (`immediate` durability) and expired sessions
    /// are swept every minute.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).open()
    }

    /// Create a database that lives entirely in memory.
    ///
    /// Creates no files; all sessions are lost when the database is dropped.
    pub fn ephemeral() -> Result<Self> {
        Self::builder().open()
    }

    /// Create a builder for database configuration.
    pub fn builder() -> SessionDbBuilder {
        SessionDbBuilder::new()
    }

    /// Open a database as described by a [`StoreConfig`].
    pub fn from_config(config: StoreConfig) -> Result<Self> {
        let interval = config.sweep_interval();
        let store = Arc::new(SessionStore::open(config)?);
        let sweeper = interval
            .map(|interval| Sweeper::spawn(Arc::clone(&store), interval))
            .transpose()?;
        Ok(SessionDb {
            store,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Get the database file path, `None` if ephemeral.
    pub fn path(&self) -> Option<&Path> {
        self.store.engine().path()
    }

    /// Check if this is an in-memory database.
    pub fn is_ephemeral(&self) -> bool {
        self.store.engine().is_ephemeral()
    }

    /// Get the commit durability mode.
    pub fn durability_mode(&self) -> DurabilityMode {
        self.store.engine().durability()
    }

    /// Check if the background sweeper is running.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.lock().as_ref().is_some_and(Sweeper::is_running)
    }

    /// Gracefully close the database.
    ///
    /// Stops the sweeper, runs one last sweep of expired sessions, and
    /// refuses further operations with `Closed`. A failed final sweep is
    /// logged and does not prevent closing. Calling it again is a no-op.
    pub fn close(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        if !self.store.is_closed() {
            match self.store.sweep_expired(Utc::now()) {
                Ok(report) => debug!(removed = report.removed, "Final sweep"),
                Err(e) => warn!(error = %e, "Final sweep failed"),
            }
            self.store.close();
            info!(path = ?self.path(), "Closed session database");
        }
    }
}

impl Deref for SessionDb {
    type Target = SessionStore;

    fn deref(&self) -> &SessionStore {
        &self.store
    }
}

impl Drop for SessionDb {
    fn drop(&mut self) {
        // Joins the sweeper thread, which holds a reference to the store
        drop(self.sweeper.get_mut().take());
    }
}

impl std::fmt::Debug for SessionDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDb")
            .field("store", &self.store)
            .field("sweeper", &self.has_sweeper())
            .finish()
    }
}

/// Builder for database configuration.
///
/// # Example
///
/// ```
/// use sessiondb::SessionDb;
/// use std::time::Duration;
///
/// let db = SessionDb::builder()
///     .lock_timeout(Duration::from_millis(500))
///     .default_ttl(Duration::from_secs(3600))
///     .no_sweeper()
///     .open()?;
/// assert!(db.is_ephemeral());
/// # Ok::<(), sessiondb::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionDbBuilder {
    config: StoreConfig,
}

impl SessionDbBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the database file path.
    ///
    /// Without a path the database is in-memory.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the commit durability mode.
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.config.durability = mode;
        self
    }

    /// Never fsync commits. Recent sessions are lost on crash.
    pub fn no_durability(self) -> Self {
        self.durability(DurabilityMode::None)
    }

    /// Fsync every commit (the default).
    pub fn strict(self) -> Self {
        self.durability(DurabilityMode::Immediate)
    }

    /// Bound each wait for a session lock.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout_ms = duration_ms(timeout);
        self
    }

    /// Run the background sweep every `interval`.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval_ms = duration_ms(interval);
        self
    }

    /// Do not start the background sweeper.
    ///
    /// Expired sessions are then only removed by explicit
    /// [`sweep_expired`](SessionStore::sweep_expired) calls.
    pub fn no_sweeper(mut self) -> Self {
        self.config.sweep_interval_ms = 0;
        self
    }

    /// TTL for sessions created by `upsert`.
    ///
    /// Stored in whole seconds, rounded up: 1500ms becomes 2s. A zero TTL
    /// is rejected by [`open`](Self::open).
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        self.config.default_ttl_secs = Some(secs);
        self
    }

    /// Cap the number of stored sessions.
    ///
    /// At the cap, new sessions fail with `CapacityExceeded`.
    pub fn max_sessions(mut self, limit: usize) -> Self {
        self.config.max_sessions = Some(limit);
        self
    }

    /// Cap the number of stored sessions, evicting the least recently
    /// updated one to make room for a new session.
    pub fn max_sessions_evicting(mut self, limit: usize) -> Self {
        self.config.max_sessions = Some(limit);
        self.config.capacity_policy = CapacityPolicy::EvictOldest;
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<SessionDb> {
        SessionDb::from_config(self.config)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
