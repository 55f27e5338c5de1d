//! Remote API error types.

use thiserror::Error;

/// Result type for remote API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that prevent a remote call from producing an [`ApiResponse`](crate::ApiResponse).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credentials are malformed. Retrying cannot succeed.
    #[error("invalid account credentials: {0}")]
    InvalidCredentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status where a payload was
    /// required.
    #[error("remote returned {code}: {}", .messages.join("; "))]
    BadResponse { code: u16, messages: Vec<String> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Status code to record for this failure. Failures that never reached
    /// the service map to 500.
    pub fn code(&self) -> u16 {
        match self {
            ApiError::BadResponse { code, .. } => *code,
            ApiError::Http(e) => e.status().map_or(500, |s| s.as_u16()),
            ApiError::InvalidCredentials(_) => 401,
            _ => 500,
        }
    }

    /// Messages to record for this failure.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ApiError::BadResponse { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}
