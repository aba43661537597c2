//! Dispatch error types.
//!
//! Errors are categorized by where they originate:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Input** | `InvalidMode`, `InvalidCommand` | Fix the submission |
//! | **Backpressure** | `QueueFull` | Retry the submission later |
//! | **Lifecycle** | `Timeout`, `ShuttingDown` | Poll again, or submit to a running dispatcher |
//! | **Store** | `Store(StoreError)` | Depends on the store variant |
//! | **Config** | `Config(ConfigError)` | Fix configuration |
//!
//! Runtime-originated failures are *not* errors here: a negative result code
//! is retried inside the dispatch loop, and a positive one is a terminal job
//! status carrying decoded text.

use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Errors surfaced by the dispatcher to its caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// Mode string is not one of `verbatim`, `simulation`, `echo`.
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Job string does not match the axis/angle grammar.
    #[error("Job string not in the valid format: {0}")]
    InvalidCommand(String),

    /// The pending-job queue is at capacity.
    #[error("Dispatch queue full ({0} pending)")]
    QueueFull(usize),

    /// A job did not reach a terminal state within the caller's deadline.
    #[error("Timeout waiting for job {0}")]
    Timeout(JobId),

    /// The dispatcher no longer accepts submissions.
    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    /// The job store rejected or failed an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DispatchError {
    /// Returns `true` if the same call may succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueFull(_) | Self::Timeout(_) => true,
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Errors from a [`JobStore`](crate::store::JobStore) implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No record with this id.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The update would move the record backwards or out of a terminal state.
    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// The storage layer failed; the write did not persist.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Backend failures may clear on their own; the others will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Errors resolving a [`DispatchConfig`](crate::config::DispatchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
