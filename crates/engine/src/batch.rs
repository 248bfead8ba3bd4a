//! Multi-session batch descriptor
//!
//! A [`Batch`] collects mutation functions for several sessions. The store
//! applies all of them in one engine transaction under locks taken in
//! ascending key order: either every mutation commits or none does.
//!
//! ```
//! use sessiondb_engine::Batch;
//! use sessiondb_core::json;
//!
//! let batch = Batch::new()
//!     .update("b", |p| { p.insert("x".into(), json!(1)); Ok(()) })
//!     .update("a", |p| { p.insert("x".into(), json!(2)); Ok(()) });
//! let keys: Vec<&str> = batch.keys().map(|k| k.as_str()).collect();
//! assert_eq!(keys, ["a", "b"]);
//! ```

use sessiondb_core::{Error, Payload, Result, SessionKey};
use std::collections::BTreeMap;

/// One registered mutation
pub(crate) type Mutation<'a> = Box<dyn FnOnce(&mut Payload) -> Result<()> + 'a>;

/// Set of session keys with their mutation functions
///
/// Mutations registered for the same key run in registration order.
#[derive(Default)]
#[must_use = "a batch does nothing until passed to SessionStore::batch_update"]
pub struct Batch<'a> {
    ops: BTreeMap<SessionKey, Vec<Mutation<'a>>>,
    /// First malformed key, reported when the batch is applied
    invalid: Option<Error>,
}

impl<'a> Batch<'a> {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mutation of `key`'s payload
    pub fn update<F>(mut self, key: impl AsRef<str>, mutate: F) -> Self
    where
        F: FnOnce(&mut Payload) -> Result<()> + 'a,
    {
        match SessionKey::new(key.as_ref()) {
            Ok(key) => self.ops.entry(key).or_default().push(Box::new(mutate)),
            Err(e) => {
                self.invalid.get_or_insert(e);
            }
        }
        self
    }

    /// Distinct keys in lock order
    pub fn keys(&self) -> impl Iterator<Item = &SessionKey> {
        self.ops.keys()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if no mutation is registered
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Result<BTreeMap<SessionKey, Vec<Mutation<'a>>>> {
        match self.invalid {
            Some(e) => Err(e),
            None => Ok(self.ops),
        }
    }
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("keys", &self.ops.keys().collect::<Vec<_>>())
            .field("invalid", &self.invalid)
            .finish()
    }
}
