//! Per-session lock registry
//!
//! Maps each session key to a lock that serializes logical updates of that
//! session. Locks are created lazily on first acquisition and removed only
//! through [`KeyGuard::forget`].
//!
//! # Why a lock per key
//!
//! The engine serializes transactions, but a read-modify-write that reads
//! outside the writer's critical section computes against a stale base and
//! loses the concurrent update. Holding the key's lock across the whole
//! read-modify-write closes that window, while different keys never
//! contend with each other.
//!
//! # Forget protocol
//!
//! ```text
//! holder:  acquire(key) -> delete record -> commit -> guard.forget()
//!                                                     |- remove map entry
//!                                                     |- retire lock, wake waiters
//! waiter:  acquire(key) ... wakes on retired lock -> re-resolve from map
//! ```
//!
//! A waiter never ends up holding a retired lock, so at most one live lock
//! exists per key and a deleted session is never paired with a stale lock.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use sessiondb_core::{Deadline, Error, Result, SessionKey};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    retired: bool,
}

enum Acquire {
    Acquired,
    Retired,
    TimedOut,
}

/// Mutual-exclusion primitive for one session key
#[derive(Debug, Default)]
struct KeyLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl KeyLock {
    fn lock_until(&self, deadline: Deadline) -> Acquire {
        let mut state = self.state.lock();
        loop {
            if state.retired {
                return Acquire::Retired;
            }
            if !state.held {
                state.held = true;
                return Acquire::Acquired;
            }
            if self
                .released
                .wait_until(&mut state, deadline.instant())
                .timed_out()
            {
                // Released right at the deadline still counts
                if state.retired {
                    return Acquire::Retired;
                }
                if !state.held {
                    state.held = true;
                    return Acquire::Acquired;
                }
                return Acquire::TimedOut;
            }
        }
    }

    fn unlock(&self) {
        self.state.lock().held = false;
        self.released.notify_one();
    }

    fn retire(&self) {
        {
            let mut state = self.state.lock();
            state.held = false;
            state.retired = true;
        }
        self.released.notify_all();
    }

    fn is_held(&self) -> bool {
        self.state.lock().held
    }
}

/// Registry of per-session locks
///
/// # Thread Safety
///
/// The key → lock map is a sharded `DashMap`: creating or looking up locks
/// for different keys only contends when the keys share a shard, and never
/// waits on a held session lock.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<SessionKey, Arc<KeyLock>>,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The live lock for `key`, created if absent
    ///
    /// Concurrent first callers for the same key all receive the same lock.
    fn resolve(&self, key: &SessionKey) -> Arc<KeyLock> {
        if let Some(lock) = self.locks.get(key.as_str()) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(KeyLock::default()))
                .value(),
        )
    }

    /// Lock `key`, waiting at most until `deadline`
    ///
    /// Returns `LockTimeout` if the key is still held when the deadline
    /// passes. The returned guard releases the key on drop.
    pub fn acquire(&self, key: &SessionKey, deadline: Deadline) -> Result<KeyGuard<'_>> {
        let started = Instant::now();
        loop {
            let lock = self.resolve(key);
            match lock.lock_until(deadline) {
                Acquire::Acquired => {
                    trace!(key = %key, "Acquired session lock");
                    return Ok(KeyGuard {
                        registry: self,
                        key: key.clone(),
                        lock,
                        released: false,
                    });
                }
                Acquire::Retired => {
                    trace!(key = %key, "Session lock retired while waiting, retrying");
                }
                Acquire::TimedOut => {
                    let waited_ms = started.elapsed().as_millis().min(u64::MAX as u128) as u64;
                    debug!(key = %key, waited_ms, "Timed out waiting for session lock");
                    return Err(Error::LockTimeout {
                        key: key.to_string(),
                        waited_ms,
                    });
                }
            }
        }
    }

    /// Check if a lock is registered for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }

    /// Check if `key`'s lock is currently held
    pub fn is_held(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .map(|lock| lock.is_held())
            .unwrap_or(false)
    }

    /// Number of registered locks
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if no lock is registered
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn remove(&self, key: &SessionKey, lock: &Arc<KeyLock>) {
        self.locks
            .remove_if(key.as_str(), |_, current| Arc::ptr_eq(current, lock));
    }
}

/// Exclusive hold on one session key
///
/// Dropping the guard releases the key.
#[must_use = "the session lock is released as soon as the guard is dropped"]
pub struct KeyGuard<'a> {
    registry: &'a LockRegistry,
    key: SessionKey,
    lock: Arc<KeyLock>,
    released: bool,
}

impl KeyGuard<'_> {
    /// The locked key
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Remove the key's lock from the registry and release it
    ///
    /// Call only after the key's record has been deleted and the deletion
    /// committed. Threads waiting on this lock retry against the registry
    /// and get a fresh lock.
    pub fn forget(mut self) {
        self.registry.remove(&self.key, &self.lock);
        self.lock.retire();
        self.released = true;
        debug!(key = %self.key, "Forgot session lock");
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.lock.unlock();
        }
    }
}

impl std::fmt::Debug for KeyGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}
