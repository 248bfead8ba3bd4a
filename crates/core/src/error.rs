//! Error types for SessionDB.
//!
//! Every operation in the workspace returns [`Result`]. The variants fall
//! into three groups:
//!
//! | Group | Variants | Caller action |
//! |-------|----------|---------------|
//! | Expected outcome | `NotFound`, `AlreadyExists`, `MutationRejected` | Handle as control flow |
//! | Contention | `LockTimeout`, `DeadlineExceeded` | Retry at a higher level |
//! | Fault | `EngineFailure` | Surface, mark session unhealthy |
//!
//! The store never retries on its own.

use thiserror::Error;

/// All SessionDB errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The session record does not exist
    #[error("session not found: {key}")]
    NotFound {
        /// Session key
        key: String,
    },

    /// Create was called on a live key
    #[error("session already exists: {key}")]
    AlreadyExists {
        /// Session key
        key: String,
    },

    /// The caller's mutation function declined the update
    #[error("mutation rejected for session {key}: {reason}")]
    MutationRejected {
        /// Session key (filled in by the store)
        key: String,
        /// Reason given by the mutation function
        reason: String,
    },

    /// Engine I/O, commit, open, or decode failure
    #[error("engine failure: {message}")]
    EngineFailure {
        /// Description of the underlying failure
        message: String,
    },

    /// Gave up waiting for a session's lock
    #[error("timed out after {waited_ms}ms waiting for lock on session {key}")]
    LockTimeout {
        /// Session key whose lock was contended
        key: String,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// The operation's deadline passed after its locks were acquired
    #[error("deadline exceeded during {stage}")]
    DeadlineExceeded {
        /// Stage of the operation that observed the expired deadline
        stage: &'static str,
    },

    /// A payload field did not have the expected shape
    #[error("invalid shape for field {field}: expected {expected}, got {actual}")]
    InvalidShape {
        /// Field name
        field: String,
        /// Expected shape
        expected: &'static str,
        /// Shape actually found
        actual: &'static str,
    },

    /// The configured maximum number of sessions is reached
    #[error("session capacity exceeded: limit is {limit}")]
    CapacityExceeded {
        /// Configured limit
        limit: usize,
    },

    /// The session key is malformed
    #[error("invalid session key {key:?}: {reason}")]
    InvalidKey {
        /// Offending key
        key: String,
        /// Why the key was refused
        reason: &'static str,
    },

    /// An argument other than the key is out of range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store has been closed
    #[error("session store is closed")]
    Closed,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for SessionDB operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Rejection returned from inside a mutation function.
    ///
    /// The store attaches the session key before the error reaches the caller.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Error::MutationRejected {
            key: String::new(),
            reason: reason.into(),
        }
    }

    /// Engine failure from any displayable source error.
    pub fn engine(source: impl std::fmt::Display) -> Self {
        Error::EngineFailure {
            message: source.to_string(),
        }
    }

    /// Fill in the key of a rejection raised by a mutation function.
    pub fn for_key(self, session_key: &str) -> Self {
        match self {
            Error::MutationRejected { key, reason } if key.is_empty() => {
                Error::MutationRejected {
                    key: session_key.to_string(),
                    reason,
                }
            }
            other => other,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if the caller ran out of time (lock wait or deadline).
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::LockTimeout { .. } | Error::DeadlineExceeded { .. }
        )
    }

    /// Check if this error is retryable.
    ///
    /// Only contention is retryable; the store itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.is_timeout()
    }

    /// Check if this is an expected control-flow outcome rather than a fault.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::AlreadyExists { .. } | Error::MutationRejected { .. }
        )
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::EngineFailure { .. })
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::EngineFailure {
            message: format!("record encoding failed: {}", e),
        }
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::EngineFailure {
            message: format!("corrupt session record: {}", e),
        }
    }
}
