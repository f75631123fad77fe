//! Error types for courier
//!
//! One enum covers everything that can cross the bridge: failures reported by
//! the engine through its error channel, failures raised while invoking an
//! engine call, protocol violations, caller errors, scheduler failures and
//! errors escaping application attempt logic.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Operation | `DocumentNotFound`, `DocumentExists`, `CasMismatch`, `Conflict`, `Query`, `AttemptExpired` |
//! | Input | `InvalidArgument`, `Serialization`, `Config` |
//! | Protocol | `Unknown` |
//! | Invocation | `EngineFault` |
//! | Caller | `AttemptClosed`, `ForeignAttempt`, `SessionClosed`, `InvalidOperation` |
//! | Scheduler | `Scheduler` |
//! | Logic | `Application` |
//! | Outcome | `TransactionFailed`, `TransactionExpired` |
//! | System | `Internal` |

use crate::types::AttemptId;
use thiserror::Error;

/// Result type alias for courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by application attempt logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for courier
#[derive(Debug, Error)]
pub enum Error {
    // ==================== Operation Errors ====================
    /// Document does not exist in the attempt's visible state
    #[error("document not found: {id}")]
    DocumentNotFound {
        /// Document id
        id: String,
    },

    /// Document already exists in the attempt's visible state
    #[error("document exists: {id}")]
    DocumentExists {
        /// Document id
        id: String,
    },

    /// Document changed since it was read within this attempt
    #[error("cas mismatch on {id}")]
    CasMismatch {
        /// Document id
        id: String,
    },

    /// Transient write-write or read-write conflict
    #[error("conflict: {reason}")]
    Conflict {
        /// What conflicted
        reason: String,
    },

    /// Query rejected or failed inside the engine
    #[error("query error: {reason}")]
    Query {
        /// Engine-provided reason
        reason: String,
    },

    /// The attempt ran past the transaction deadline
    #[error("attempt expired")]
    AttemptExpired,

    // ==================== Input Errors ====================
    /// Invalid argument supplied to an operation
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected
        reason: String,
    },

    /// Content could not be encoded or decoded
    #[error("serialization error: {reason}")]
    Serialization {
        /// Serializer message
        reason: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {reason}")]
    Config {
        /// Why the configuration was rejected
        reason: String,
    },

    // ==================== Protocol Errors ====================
    /// The engine fired the error callback without an error value
    #[error("unknown error in {operation}")]
    Unknown {
        /// Operation whose error callback was empty
        operation: String,
    },

    // ==================== Invocation Errors ====================
    /// Wrapped internal fault raised while issuing an engine call
    ///
    /// The bridge unwraps this to `cause` when one is present.
    #[error("engine fault: {message}")]
    EngineFault {
        /// Wrapper message
        message: String,
        /// Causal error, if the fault wraps one
        #[source]
        cause: Option<Box<Error>>,
    },

    // ==================== Caller Errors ====================
    /// Operation issued after its attempt returned to the engine
    #[error("{attempt} is closed; operations must finish before the attempt returns")]
    AttemptClosed {
        /// The closed attempt
        attempt: AttemptId,
    },

    /// Result from one attempt passed to an operation of another attempt
    #[error("result belongs to {actual}, not {expected}")]
    ForeignAttempt {
        /// Attempt the operation was issued on
        expected: AttemptId,
        /// Attempt that produced the result
        actual: AttemptId,
    },

    /// Engine session already destroyed
    #[error("transaction session is closed")]
    SessionClosed,

    /// Operation not allowed in the current state
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation was rejected
        reason: String,
    },

    // ==================== Scheduler Errors ====================
    /// Attempt logic could not be submitted to or awaited on the scheduler
    #[error("scheduler error: {reason}")]
    Scheduler {
        /// What failed
        reason: String,
    },

    // ==================== Logic Errors ====================
    /// Error raised by application attempt logic
    #[error("attempt logic failed: {0}")]
    Application(#[source] BoxError),

    // ==================== Outcome Errors ====================
    /// Transaction failed after the engine stopped retrying
    #[error("transaction {transaction_id} failed: {cause}")]
    TransactionFailed {
        /// Engine transaction id
        transaction_id: String,
        /// Error that ended the last attempt
        #[source]
        cause: Box<Error>,
    },

    /// Transaction ran out of time before an attempt committed
    #[error("transaction {transaction_id} expired")]
    TransactionExpired {
        /// Engine transaction id
        transaction_id: String,
    },

    // ==================== System Errors ====================
    /// Internal error (bug or invariant violation)
    #[error("internal error: {reason}")]
    Internal {
        /// Description
        reason: String,
    },
}

impl Error {
    /// Internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Error::Internal {
            reason: reason.into(),
        }
    }

    /// Invalid argument
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Serialization failure
    pub fn serialization(reason: impl Into<String>) -> Self {
        Error::Serialization {
            reason: reason.into(),
        }
    }

    /// Configuration failure
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Scheduler failure
    pub fn scheduler(reason: impl Into<String>) -> Self {
        Error::Scheduler {
            reason: reason.into(),
        }
    }

    /// Invalid operation
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Protocol violation: empty error callback for `operation`
    pub fn unknown(operation: impl Into<String>) -> Self {
        Error::Unknown {
            operation: operation.into(),
        }
    }

    /// Engine fault wrapping a causal error
    pub fn fault(message: impl Into<String>, cause: Error) -> Self {
        Error::EngineFault {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Wrap an error raised by application attempt logic
    pub fn application(err: impl Into<BoxError>) -> Self {
        Error::Application(err.into())
    }

    /// Whether the engine may retry the attempt that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict { .. } | Error::CasMismatch { .. })
    }

    /// Whether this is a not-found outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DocumentNotFound { .. })
    }

    /// Strip engine-fault wrappers, exposing the causal error
    ///
    /// A fault without a cause is returned unchanged.
    pub fn into_cause(self) -> Error {
        let mut err = self;
        loop {
            match err {
                Error::EngineFault {
                    cause: Some(cause), ..
                } => err = *cause,
                other => return other,
            }
        }
    }

    /// Innermost error, following transaction-failure and fault chains
    pub fn root_cause(&self) -> &Error {
        let mut err = self;
        loop {
            match err {
                Error::TransactionFailed { cause, .. } => err = cause,
                Error::EngineFault {
                    cause: Some(cause), ..
                } => err = cause,
                other => return other,
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::config(e.to_string())
    }
}
