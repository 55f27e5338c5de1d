//! Error types for the indexing engine.
//!
//! Only configuration and credential problems are errors. Remote failures
//! are reported as [`SyncResult`](indexsync_types::SyncResult) values.

use indexsync_remote::ApiError;
use indexsync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type IndexingResult<T> = Result<T, IndexingError>;

#[derive(Debug, Error)]
pub enum IndexingError {
    /// Two local attributes resolve to the same remote name.
    #[error(
        "attribute mapping missing: {code} and {conflicting_code} both resolve to remote name {remote_name}"
    )]
    AttributeMappingMissing {
        code: String,
        conflicting_code: String,
        remote_name: String,
    },

    #[error("no scope is associated with API key {api_key}")]
    ScopeNotFound { api_key: String },

    #[error("no account credentials configured for scope {scope}")]
    CredentialsNotFound { scope: String },

    /// The remote service rejected the credentials format.
    #[error("invalid account credentials: {0}")]
    InvalidAccountCredentials(String),

    #[error("remote error: {0}")]
    Remote(ApiError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IndexingError {
    /// Operator misconfiguration; never retried automatically.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            IndexingError::AttributeMappingMissing { .. }
                | IndexingError::ScopeNotFound { .. }
                | IndexingError::CredentialsNotFound { .. }
                | IndexingError::Config(_)
        )
    }

    /// Errors that must stop the current cycle rather than be retried.
    pub fn is_fatal(&self) -> bool {
        self.is_configuration_error() || matches!(self, IndexingError::InvalidAccountCredentials(_))
    }
}

impl From<ApiError> for IndexingError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials(msg) => IndexingError::InvalidAccountCredentials(msg),
            other => IndexingError::Remote(other),
        }
    }
}
