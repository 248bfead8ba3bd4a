//! Session lifecycle: create, extend, delete, eviction, expiry sweep
//!
//! Every removal path follows the forget protocol: the record is deleted
//! and committed while the key's lock is held, then the lock is forgotten
//! (removed from the registry) instead of released.

use crate::config::CapacityPolicy;
use crate::store::{Missing, SessionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sessiondb_concurrency::LockSet;
use sessiondb_core::{Deadline, Error, Payload, Result, SessionKey, SessionRecord};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired candidates found by the scan
    pub examined: usize,
    /// Records deleted
    pub removed: usize,
    /// Candidates whose lock was busy; retried on the next sweep
    pub skipped: usize,
}

/// Result of re-checking a sweep candidate under its lock
enum Recheck {
    Removed,
    Renewed,
    Gone,
}

impl SessionStore {
    /// Create a session
    ///
    /// Fails with `AlreadyExists` if a live record is stored under `key`. A
    /// record that has expired but not been swept yet is replaced. At
    /// `max_sessions` it fails with `CapacityExceeded`, or evicts the least
    /// recently updated session under [`CapacityPolicy::EvictOldest`].
    pub fn create(
        &self,
        key: &str,
        payload: Payload,
        ttl: Option<Duration>,
    ) -> Result<SessionRecord> {
        let key = SessionKey::new(key)?;
        self.ensure_open()?;
        let deadline = self.default_deadline();
        self.make_room(&key, deadline)?;
        let guard = self.locks.acquire(&key, deadline)?;

        let result = self.engine.transact_until(deadline, |txn| {
            let now = Utc::now();
            match txn.get(key.as_str())? {
                Some(existing) if !existing.is_expired(now) => {
                    return Err(Error::AlreadyExists {
                        key: key.to_string(),
                    });
                }
                Some(_) => debug!(key = %key, "Replacing expired session"),
                None => self.check_capacity(txn)?,
            }
            let record = SessionRecord::new(key.clone(), payload, ttl, now)?;
            txn.put(&record)?;
            Ok(record)
        });

        match result {
            Ok(record) => {
                debug!(key = %key, "Created session");
                Ok(record)
            }
            Err(e @ Error::AlreadyExists { .. }) => {
                debug!(key = %key, "Session already exists");
                Err(e)
            }
            Err(e) => {
                self.forget_if_absent(guard);
                Err(e)
            }
        }
    }

    /// Evict the least recently updated session when storing `key` as a new
    /// record would pass `max_sessions`
    ///
    /// Only acts under [`CapacityPolicy::EvictOldest`]. Runs before the
    /// caller locks `key`, so at most one session lock is held at a time. The
    /// capacity check inside the caller's transaction stays authoritative:
    /// if concurrent creators fill the freed slot, the caller still fails
    /// with `CapacityExceeded`.
    pub(crate) fn make_room(&self, key: &SessionKey, deadline: Deadline) -> Result<()> {
        let Some(limit) = self.config.max_sessions else {
            return Ok(());
        };
        if self.config.capacity_policy != CapacityPolicy::EvictOldest {
            return Ok(());
        }

        let records = self.engine.scan()?;
        if records.len() < limit || records.iter().any(|r| r.key == *key) {
            return Ok(());
        }
        let oldest = records.into_iter().min_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        match oldest {
            Some(oldest) => self.evict(&oldest, deadline),
            None => Ok(()),
        }
    }

    /// Delete `candidate` unless it changed since it was read
    fn evict(&self, candidate: &SessionRecord, deadline: Deadline) -> Result<()> {
        let guard = self.locks.acquire(&candidate.key, deadline)?;
        let removed = self.engine.transact_until(deadline, |txn| {
            match txn.get(candidate.key.as_str())? {
                Some(current) if current.version == candidate.version => {
                    txn.delete(candidate.key.as_str())
                }
                _ => Ok(false),
            }
        })?;

        if removed {
            info!(
                key = %candidate.key,
                updated_at = %candidate.updated_at,
                "Evicted oldest session to make room"
            );
            guard.forget();
        } else {
            debug!(key = %candidate.key, "Eviction candidate changed, kept");
            self.forget_if_absent(guard);
        }
        Ok(())
    }

    /// Replace the session's expiry with `now + ttl` (`None` never expires)
    pub fn extend(&self, key: &str, ttl: Option<Duration>) -> Result<SessionRecord> {
        self.guarded_update(key, self.default_deadline(), Missing::Fail, |record| {
            record.set_ttl(ttl, Utc::now())
        })
    }

    /// Delete a session and forget its lock
    ///
    /// Fails with `NotFound` if no record is stored under `key`.
    pub fn delete(&self, key: &str) -> Result<()> {
        let key = SessionKey::new(key)?;
        self.ensure_open()?;
        let deadline = self.default_deadline();
        let guard = self.locks.acquire(&key, deadline)?;

        let removed = self
            .engine
            .transact_until(deadline, |txn| txn.delete(key.as_str()))?;
        guard.forget();

        if removed {
            debug!(key = %key, "Deleted session");
            Ok(())
        } else {
            Err(Error::NotFound {
                key: key.into_string(),
            })
        }
    }

    /// Delete several sessions in one transaction
    ///
    /// Locks are taken in ascending key order. Missing keys are skipped.
    /// Returns the number of records deleted.
    pub fn delete_many<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| SessionKey::new(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.ensure_open()?;
        if keys.is_empty() {
            return Ok(0);
        }

        let deadline = self.default_deadline();
        let mut locks = LockSet::acquire(&self.locks, &keys, deadline)?;
        let removed = self.engine.transact_until(deadline, |txn| {
            let mut removed = 0;
            for key in locks.keys() {
                if txn.delete(key.as_str())? {
                    removed += 1;
                }
            }
            Ok(removed)
        })?;

        for key in &keys {
            locks.forget(key.as_str());
        }
        debug!(requested = keys.len(), removed, "Deleted sessions");
        Ok(removed)
    }

    /// Delete every session expired at `now`
    ///
    /// Candidates come from an unguarded scan. Each is re-checked under its
    /// lock before deletion, so a session renewed in the meantime survives.
    /// Candidates whose lock is busy past the lock timeout are skipped.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let candidates: Vec<SessionKey> = self
            .list()?
            .into_iter()
            .filter(|record| record.is_expired(now))
            .map(|record| record.key)
            .collect();

        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for key in candidates {
            self.ensure_open()?;
            let deadline = self.default_deadline();
            let guard = match self.locks.acquire(&key, deadline) {
                Ok(guard) => guard,
                Err(e) if e.is_timeout() => {
                    warn!(key = %key, "Skipping expired session, lock busy");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let outcome = self.engine.transact_until(deadline, |txn| {
                match txn.get(key.as_str())? {
                    Some(record) if record.is_expired(now) => {
                        txn.delete(key.as_str())?;
                        Ok(Recheck::Removed)
                    }
                    Some(_) => Ok(Recheck::Renewed),
                    None => Ok(Recheck::Gone),
                }
            });

            match outcome {
                Ok(Recheck::Removed) => {
                    guard.forget();
                    report.removed += 1;
                }
                Ok(Recheck::Gone) => guard.forget(),
                Ok(Recheck::Renewed) => debug!(key = %key, "Session renewed before sweep"),
                Err(e) if e.is_timeout() => {
                    warn!(key = %key, "Skipping expired session, deadline passed");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                removed = report.removed,
                skipped = report.skipped,
                "Swept expired sessions"
            );
        }
        Ok(report)
    }
}
