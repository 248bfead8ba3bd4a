//! Concurrent session store
//!
//! [`SessionStore`] combines the engine adapter with the lock registry:
//!
//! ```text
//! update(key, f):   acquire(key) -> txn { read -> f(payload) -> write } -> commit -> release
//! batch_update(b):  LockSet(sorted keys) -> txn { read all -> apply all -> write all } -> commit -> release (reverse)
//! ```
//!
//! Every write goes through a mutation function that sees the current value
//! under the key's lock, so concurrent updates of one session never compute
//! against a stale base. Unguarded reads see the last committed state.
//!
//! # Lock entries for absent keys
//!
//! Locking a key registers a lock for it. When a guarded operation finds
//! that the key has no record once it is done, it forgets the lock instead
//! of releasing it, so probing missing keys never grows the registry.

use crate::batch::Batch;
use crate::config::StoreConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sessiondb_concurrency::{KeyGuard, LockRegistry, LockSet};
use sessiondb_core::{Deadline, Error, Payload, Result, SessionKey, SessionRecord};
use sessiondb_storage::{Engine, EngineTxn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// What a guarded operation does when the key has no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missing {
    /// Fail with `NotFound`
    Fail,
    /// Start from an empty payload with the default TTL
    StartEmpty,
}

/// Point-in-time counts over the stored sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Stored records
    pub total: usize,
    /// Records not expired at the sampled instant
    pub active: usize,
    /// Records expired but not yet swept
    pub expired: usize,
    /// Locks currently registered
    pub tracked_locks: usize,
}

/// Durable, concurrency-safe store of session records
///
/// # Thread Safety
///
/// `SessionStore` is `Send + Sync`; share it behind an `Arc`. Operations on
/// one key are serialized by that key's lock, operations on different keys
/// run in parallel, and multi-key operations lock in ascending key order.
pub struct SessionStore {
    pub(crate) engine: Engine,
    pub(crate) locks: LockRegistry,
    pub(crate) config: StoreConfig,
    closed: AtomicBool,
}

impl SessionStore {
    /// Open a store as described by `config`
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let engine = match &config.path {
            Some(path) => Engine::open(path, config.durability)?,
            None => Engine::ephemeral()?,
        };
        info!(
            path = ?config.path,
            lock_timeout_ms = config.lock_timeout_ms,
            "Opened session store"
        );
        Ok(SessionStore {
            engine,
            locks: LockRegistry::new(),
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// In-memory store with default settings
    pub fn ephemeral() -> Result<Self> {
        Self::open(StoreConfig::default())
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Session lock registry
    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Deadline for an operation starting now
    pub fn default_deadline(&self) -> Deadline {
        Deadline::after(self.config.lock_timeout())
    }

    /// Stop accepting operations
    ///
    /// Calls made afterwards fail with `Closed`. Operations already past
    /// this check run to completion.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(tracked_locks = self.locks.len(), "Closed session store");
        }
    }

    /// Check if [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    // ========================================================================
    // Unguarded reads
    // ========================================================================

    /// Last committed record for `key`
    ///
    /// Expired records are returned until the sweep removes them; use
    /// [`SessionRecord::is_expired`] to tell them apart.
    pub fn get(&self, key: &str) -> Result<Option<SessionRecord>> {
        self.ensure_open()?;
        self.engine.get(key)
    }

    /// Check if a record is stored for `key`
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Every stored record, sorted by key
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        self.ensure_open()?;
        self.engine.scan()
    }

    /// Count stored, live and expired records at `now`
    pub fn stats(&self, now: DateTime<Utc>) -> Result<SessionStats> {
        let records = self.list()?;
        let expired = records.iter().filter(|r| r.is_expired(now)).count();
        Ok(SessionStats {
            total: records.len(),
            active: records.len() - expired,
            expired,
            tracked_locks: self.locks.len(),
        })
    }

    // ========================================================================
    // Single-key updates
    // ========================================================================

    /// Apply `mutate` to the session's payload atomically
    ///
    /// Waits at most the configured lock timeout for the session's lock.
    /// Returns the committed record. If `mutate` fails, nothing is written
    /// and its error is returned with the key attached. Fails with
    /// `NotFound` if the session does not exist.
    ///
    /// # Example
    ///
    /// ```
    /// use sessiondb_engine::SessionStore;
    /// use sessiondb_core::{coerce, json};
    ///
    /// let store = SessionStore::ephemeral().unwrap();
    /// store.create("s1", Default::default(), None).unwrap();
    /// let record = store
    ///     .update("s1", |p| {
    ///         let n = coerce::field_int(p, "count");
    ///         p.insert("count".into(), json!(n + 1));
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(record.payload["count"], json!(1));
    /// assert_eq!(record.version, 2);
    /// ```
    pub fn update<F>(&self, key: &str, mutate: F) -> Result<SessionRecord>
    where
        F: FnOnce(&mut Payload) -> Result<()>,
    {
        self.update_with_deadline(key, self.default_deadline(), mutate)
    }

    /// Like [`update`](Self::update), bounded by an explicit deadline
    pub fn update_with_deadline<F>(
        &self,
        key: &str,
        deadline: Deadline,
        mutate: F,
    ) -> Result<SessionRecord>
    where
        F: FnOnce(&mut Payload) -> Result<()>,
    {
        self.guarded_update(key, deadline, Missing::Fail, |record| {
            mutate(&mut record.payload)
        })
    }

    /// Like [`update`](Self::update), starting from an empty payload when
    /// the session does not exist yet
    ///
    /// A session created this way gets the configured default TTL and
    /// counts against `max_sessions` (see
    /// [`CapacityPolicy`](crate::config::CapacityPolicy)).
    pub fn upsert<F>(&self, key: &str, mutate: F) -> Result<SessionRecord>
    where
        F: FnOnce(&mut Payload) -> Result<()>,
    {
        self.guarded_update(key, self.default_deadline(), Missing::StartEmpty, |record| {
            mutate(&mut record.payload)
        })
    }

    /// Read-modify-write of one whole record under its key's lock
    pub(crate) fn guarded_update<F>(
        &self,
        key: &str,
        deadline: Deadline,
        missing: Missing,
        mutate: F,
    ) -> Result<SessionRecord>
    where
        F: FnOnce(&mut SessionRecord) -> Result<()>,
    {
        let key = SessionKey::new(key)?;
        self.ensure_open()?;
        if missing == Missing::StartEmpty {
            self.make_room(&key, deadline)?;
        }
        let guard = self.locks.acquire(&key, deadline)?;

        let mut existed = true;
        let result = self.engine.transact_until(deadline, |txn| {
            let now = Utc::now();
            let mut record = match txn.get(key.as_str())? {
                Some(record) => record,
                None => {
                    existed = false;
                    match missing {
                        Missing::Fail => {
                            return Err(Error::NotFound {
                                key: key.to_string(),
                            })
                        }
                        Missing::StartEmpty => {
                            self.check_capacity(txn)?;
                            SessionRecord::new(
                                key.clone(),
                                Payload::new(),
                                self.config.default_ttl(),
                                now,
                            )?
                        }
                    }
                }
            };

            mutate(&mut record).map_err(|e| e.for_key(key.as_str()))?;
            if existed {
                record.touch(now);
            }
            txn.put(&record)?;
            Ok(record)
        });

        match result {
            Ok(record) => {
                debug!(key = %key, version = record.version, created = !existed, "Updated session");
                Ok(record)
            }
            Err(e) => {
                if !existed {
                    guard.forget();
                }
                debug!(key = %key, error = %e, "Session update aborted");
                Err(e)
            }
        }
    }

    /// Fail with `CapacityExceeded` if one more record would pass the limit
    pub(crate) fn check_capacity(&self, txn: &EngineTxn<'_>) -> Result<()> {
        if let Some(limit) = self.config.max_sessions {
            if txn.count()? >= limit {
                return Err(Error::CapacityExceeded { limit });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Batch updates
    // ========================================================================

    /// Apply every mutation in `batch` in one atomic transaction
    ///
    /// Locks are taken in ascending key order and released in reverse. If
    /// any session is missing or any mutation fails, nothing is written.
    /// Returns the committed records by key.
    pub fn batch_update(&self, batch: Batch<'_>) -> Result<BTreeMap<SessionKey, SessionRecord>> {
        self.batch_update_with_deadline(batch, self.default_deadline())
    }

    /// Like [`batch_update`](Self::batch_update), bounded by an explicit
    /// deadline shared by every lock wait and the commit
    pub fn batch_update_with_deadline(
        &self,
        batch: Batch<'_>,
        deadline: Deadline,
    ) -> Result<BTreeMap<SessionKey, SessionRecord>> {
        let ops = batch.into_ops()?;
        self.ensure_open()?;
        if ops.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut locks = LockSet::acquire(&self.locks, ops.keys(), deadline)?;

        let result = self.engine.transact_until(deadline, |txn| {
            let now = Utc::now();
            // Every record is loaded before any mutation runs
            let mut loaded = Vec::with_capacity(ops.len());
            for (key, mutations) in ops {
                match txn.get(key.as_str())? {
                    Some(record) => loaded.push((key, record, mutations)),
                    None => {
                        return Err(Error::NotFound {
                            key: key.to_string(),
                        })
                    }
                }
            }

            let mut committed = BTreeMap::new();
            for (key, mut record, mutations) in loaded {
                for mutate in mutations {
                    mutate(&mut record.payload).map_err(|e| e.for_key(key.as_str()))?;
                }
                record.touch(now);
                txn.put(&record)?;
                committed.insert(key, record);
            }
            Ok(committed)
        });

        match result {
            Ok(committed) => {
                debug!(keys = committed.len(), "Applied session batch");
                Ok(committed)
            }
            Err(e) => {
                self.forget_absent(&mut locks);
                debug!(keys = locks.len(), error = %e, "Session batch aborted");
                Err(e)
            }
        }
    }

    // ========================================================================
    // Lock entries for absent keys
    // ========================================================================

    /// Forget `guard` if its key has no stored record, release it otherwise
    ///
    /// A failed read counts as "may exist" and releases.
    pub(crate) fn forget_if_absent(&self, guard: KeyGuard<'_>) {
        if matches!(self.engine.get(guard.key().as_str()), Ok(None)) {
            guard.forget();
        }
    }

    /// Forget every lock in `locks` whose key has no stored record
    pub(crate) fn forget_absent(&self, locks: &mut LockSet<'_>) {
        let keys: Vec<SessionKey> = locks.keys().cloned().collect();
        for key in keys {
            if matches!(self.engine.get(key.as_str()), Ok(None)) {
                locks.forget(key.as_str());
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("engine", &self.engine)
            .field("tracked_locks", &self.locks.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
