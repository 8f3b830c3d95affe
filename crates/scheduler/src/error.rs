//! Error types for the coordinator and the lease.

use steward_core::StewardError;
use steward_execution::{ExecutionError, StoreError};

/// Errors raised by [`DistributedLock`](crate::DistributedLock) implementations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Unlock or refresh by an instance that does not hold the lease.
    #[error("lease '{key}' is not held by this instance")]
    NotHeld { key: String },

    #[error("lock backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler is not running")]
    NotRunning,

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Schedule(#[from] StewardError),
}

/// Result alias for coordinator operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
