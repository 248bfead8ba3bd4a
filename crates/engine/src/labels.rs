//! Session labels and filtered listing
//!
//! Labels live in the payload's `labels` field as an array of strings.
//! Reads go through [`coerce::field_strings`], so a missing or malformed
//! field means "no labels" rather than an error. Label writes are ordinary
//! guarded updates.

use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sessiondb_core::{coerce, Result, SessionRecord, Value};
use std::collections::BTreeSet;

/// Payload field holding a session's labels
pub const LABELS_FIELD: &str = "labels";

/// Labels of a record, in stored order
pub fn labels_of(record: &SessionRecord) -> Vec<String> {
    coerce::field_strings(&record.payload, LABELS_FIELD)
}

/// Expiry state of a session at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Not expired
    Active,
    /// Expired but not yet swept
    Expired,
}

impl SessionStatus {
    /// Status of `record` at `now`
    pub fn of(record: &SessionRecord, now: DateTime<Utc>) -> Self {
        if record.is_expired(now) {
            SessionStatus::Expired
        } else {
            SessionStatus::Active
        }
    }
}

/// Criteria for [`SessionStore::list_filtered`]
///
/// Empty criteria match everything. All set criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFilter {
    /// The session must carry every one of these labels
    pub all_labels: Vec<String>,
    /// The session must carry at least one of these labels
    pub any_label: Vec<String>,
    /// Required expiry state
    pub status: Option<SessionStatus>,
    /// Created strictly after this instant
    pub created_after: Option<DateTime<Utc>>,
    /// Created strictly before this instant
    pub created_before: Option<DateTime<Utc>>,
}

impl SessionFilter {
    /// Filter matching every session
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `label`
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.all_labels.push(label.into());
        self
    }

    /// Accept sessions carrying `label` (or any other `with_any_label` label)
    pub fn with_any_label(mut self, label: impl Into<String>) -> Self {
        self.any_label.push(label.into());
        self
    }

    /// Require an expiry state
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Require creation after `at`
    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    /// Require creation before `at`
    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// Check `record` against every criterion at `now`
    pub fn matches(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let labels = labels_of(record);
        let has = |label: &String| labels.contains(label);

        if !self.all_labels.iter().all(has) {
            return false;
        }
        if !self.any_label.is_empty() && !self.any_label.iter().any(has) {
            return false;
        }
        if self.status.is_some_and(|s| s != SessionStatus::of(record, now)) {
            return false;
        }
        if self.created_after.is_some_and(|at| record.created_at <= at) {
            return false;
        }
        if self.created_before.is_some_and(|at| record.created_at >= at) {
            return false;
        }
        true
    }
}

impl SessionStore {
    /// Stored sessions carrying `label`, sorted by key
    pub fn sessions_with_label(&self, label: &str) -> Result<Vec<SessionRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|record| labels_of(record).iter().any(|l| l == label))
            .collect())
    }

    /// Every distinct label across stored sessions, sorted
    pub fn all_labels(&self) -> Result<Vec<String>> {
        let labels: BTreeSet<String> = self.list()?.iter().flat_map(labels_of).collect();
        Ok(labels.into_iter().collect())
    }

    /// Stored sessions matching `filter` at `now`, sorted by key
    pub fn list_filtered(
        &self,
        filter: &SessionFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|record| filter.matches(record, now))
            .collect())
    }

    /// Add `label` to the session, keeping labels unique
    pub fn add_label(&self, key: &str, label: &str) -> Result<SessionRecord> {
        let label = label.to_string();
        self.update(key, move |payload| {
            let mut labels = coerce::field_strings(payload, LABELS_FIELD);
            if !labels.contains(&label) {
                labels.push(label);
            }
            payload.insert(LABELS_FIELD.into(), Value::from(labels));
            Ok(())
        })
    }

    /// Remove `label` from the session
    pub fn remove_label(&self, key: &str, label: &str) -> Result<SessionRecord> {
        self.update(key, |payload| {
            let mut labels = coerce::field_strings(payload, LABELS_FIELD);
            labels.retain(|l| l != label);
            payload.insert(LABELS_FIELD.into(), Value::from(labels));
            Ok(())
        })
    }

    /// Replace the session's labels, dropping duplicates
    pub fn set_labels<I, S>(&self, key: &str, labels: I) -> Result<SessionRecord>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !unique.contains(&label) {
                unique.push(label);
            }
        }
        self.update(key, move |payload| {
            payload.insert(LABELS_FIELD.into(), Value::from(unique));
            Ok(())
        })
    }
}
