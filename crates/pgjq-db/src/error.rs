//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for pgjq_core::Error {
    fn from(err: DbError) -> Self {
        use pgjq_core::Error;

        match err {
            DbError::QueueNotFound(name) => Error::QueueNotFound(name),
            DbError::Duplicate(msg) => Error::AlreadyExists(msg),
            DbError::Database(
                e @ (sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)),
            ) => Error::Unavailable(e.to_string()),
            other => Error::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_core_kinds() {
        let err: pgjq_core::Error = DbError::QueueNotFound("jobs".into()).into();
        assert!(matches!(err, pgjq_core::Error::QueueNotFound(_)));

        let err: pgjq_core::Error = DbError::Duplicate("queue jobs".into()).into();
        assert!(matches!(err, pgjq_core::Error::AlreadyExists(_)));

        let err: pgjq_core::Error = DbError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(err.is_retryable());

        let err: pgjq_core::Error = DbError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, pgjq_core::Error::Internal(_)));
    }
}
