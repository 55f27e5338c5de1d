//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record with the same natural key already exists.
    #[error("record already exists: {0}")]
    Duplicate(String),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A stored value could not be converted into its domain type.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A previous holder of the connection mutex panicked.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl From<indexsync_types::Error> for StoreError {
    fn from(err: indexsync_types::Error) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

/// Errors from inserting a cron schedule row.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A pending row for the job already exists.
    #[error("job {0} already has a pending schedule")]
    Duplicate(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Returns true when a SQLite error is a UNIQUE/constraint violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
