//! Broker error types.

use thiserror::Error;

/// Worker backend operation errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The backend could not be reached. Treated as transient: callers
    /// retry with backoff until the grace window elapses.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for broker operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
