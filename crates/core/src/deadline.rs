//! Time budget for guarded operations.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

// Used when `now + budget` does not fit in an Instant
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Absolute point in time by which an operation must finish
///
/// Lock waits stop at the deadline with `LockTimeout`; the engine
/// transaction re-checks it before committing and aborts with
/// `DeadlineExceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline at an absolute instant
    pub fn at(instant: Instant) -> Self {
        Deadline(instant)
    }

    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Deadline(
            now.checked_add(budget)
                .unwrap_or_else(|| now + FAR_FUTURE),
        )
    }

    /// The instant this deadline expires
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left, zero once passed
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Check if the deadline has passed
    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Fail with `DeadlineExceeded` if the deadline has passed
    pub fn check(&self, stage: &'static str) -> Result<()> {
        if self.has_passed() {
            return Err(Error::DeadlineExceeded { stage });
        }
        Ok(())
    }
}
