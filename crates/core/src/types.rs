//! Session data model
//!
//! This module defines the persisted types:
//! - [`SessionKey`]: Validated, immutable session identifier
//! - [`Payload`]: Structured workflow/tool state (a JSON object)
//! - [`SessionRecord`]: Key + payload + version and lifetime metadata

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::time::Duration;

/// Maximum length of a session key in bytes
pub const MAX_KEY_LEN: usize = 1024;

/// Structured session payload: field name → JSON value
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for a session
///
/// Keys are opaque strings. They are ordered lexicographically by their
/// UTF-8 bytes, and that order is the global lock order used whenever
/// several sessions are locked together.
///
/// # Examples
///
/// ```
/// use sessiondb_core::SessionKey;
///
/// let key = SessionKey::new("session-42").unwrap();
/// assert_eq!(key.as_str(), "session-42");
/// assert!(SessionKey::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Validate and wrap a session key
    ///
    /// Rejects empty keys, keys longer than [`MAX_KEY_LEN`] bytes, and keys
    /// containing control characters.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidKey {
                key,
                reason: "key must not be empty",
            });
        }
        if key.len() > MAX_KEY_LEN {
            return Err(Error::InvalidKey {
                key,
                reason: "key exceeds maximum length",
            });
        }
        if key.chars().any(char::is_control) {
            return Err(Error::InvalidKey {
                key,
                reason: "key contains control characters",
            });
        }
        Ok(SessionKey(key))
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SessionKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        SessionKey::new(value)
    }
}

impl TryFrom<String> for SessionKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        SessionKey::new(value)
    }
}

/// A persisted session
///
/// `version` starts at 1 when the record is created and advances by one on
/// every committed update. `updated_at` never moves backwards. Neither is
/// used for concurrency control; the per-key lock provides that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier
    pub key: SessionKey,
    /// Workflow/tool state
    pub payload: Payload,
    /// Per-record update counter
    pub version: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last committed update
    pub updated_at: DateTime<Utc>,
    /// Time after which the sweep may delete the record
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Build a fresh record at version 1
    pub fn new(
        key: SessionKey,
        payload: Payload,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = ttl.map(|ttl| expiry_after(now, ttl)).transpose()?;
        Ok(SessionRecord {
            key,
            payload,
            version: 1,
            created_at: now,
            updated_at: now,
            expires_at,
        })
    }

    /// Check if the record is eligible for deletion at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Time left before expiry, `None` if the record never expires
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Advance the version and update marker after a mutation
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Replace the expiry with `now + ttl` (`None` clears it)
    pub fn set_ttl(&mut self, ttl: Option<Duration>, now: DateTime<Utc>) -> Result<()> {
        self.expires_at = ttl.map(|ttl| expiry_after(now, ttl)).transpose()?;
        Ok(())
    }
}

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::InvalidArgument(format!("ttl {:?} is out of range", ttl)))
}
