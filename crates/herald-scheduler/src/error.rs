use herald_core::TaskStatus;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Document store read or write failed.
    #[error("Store error: {0}")]
    Store(#[from] herald_store::StoreError),

    /// A record or payload could not be encoded or decoded, or the owner is invalid.
    #[error("Codec error: {0}")]
    Codec(#[from] herald_core::CoreError),

    /// Malformed due-task index entry.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Only `complete` and `cancelled` may end a task; only `pending` may start one.
    #[error("Invalid status for this operation: {0}")]
    InvalidStatus(TaskStatus),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
