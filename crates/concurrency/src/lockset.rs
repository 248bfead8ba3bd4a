//! Ordered multi-key locking
//!
//! Every operation that locks more than one session goes through
//! [`LockSet::acquire`], which locks keys in ascending key order and
//! releases them in reverse. Because all multi-key lockers agree on one
//! total order, no cycle of waits can form between them.

use crate::registry::{KeyGuard, LockRegistry};
use sessiondb_core::{Deadline, Result, SessionKey};
use tracing::trace;

/// A set of held session locks, acquired in key order
#[must_use = "the session locks are released as soon as the set is dropped"]
#[derive(Debug)]
pub struct LockSet<'a> {
    /// Held guards in acquisition (ascending key) order
    guards: Vec<KeyGuard<'a>>,
}

impl<'a> LockSet<'a> {
    /// Lock every key, in ascending order, by a shared deadline
    ///
    /// Duplicate keys are locked once. If any acquisition fails, the locks
    /// already taken are released (in reverse order) before the error is
    /// returned.
    pub fn acquire<'k, I>(registry: &'a LockRegistry, keys: I, deadline: Deadline) -> Result<Self>
    where
        I: IntoIterator<Item = &'k SessionKey>,
    {
        let mut ordered: Vec<&SessionKey> = keys.into_iter().collect();
        ordered.sort_unstable();
        ordered.dedup();

        let mut set = LockSet {
            guards: Vec::with_capacity(ordered.len()),
        };
        for key in ordered {
            set.guards.push(registry.acquire(key, deadline)?);
        }
        trace!(count = set.guards.len(), "Acquired ordered lock set");
        Ok(set)
    }

    /// Locked keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &SessionKey> {
        self.guards.iter().map(KeyGuard::key)
    }

    /// Number of held locks
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Check if the set holds no locks
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Forget one key's lock (see [`KeyGuard::forget`])
    ///
    /// Returns `false` if the key is not in the set.
    pub fn forget(&mut self, key: &str) -> bool {
        match self.guards.iter().position(|g| g.key().as_str() == key) {
            Some(index) => {
                self.guards.remove(index).forget();
                true
            }
            None => false,
        }
    }
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}
