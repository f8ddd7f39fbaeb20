//! Error types for pgjq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a caller may reasonably retry the call.
    ///
    /// A retried `Timeout` may duplicate a non-idempotent operation such as enqueue.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
