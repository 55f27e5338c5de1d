//! Remote indexing API abstraction.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use indexsync_types::{AccountCredentials, RemoteAttribute};
use serde::{Deserialize, Serialize};

/// Outcome of a write call that reached the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    code: u16,
    messages: Vec<String>,
}

impl ApiResponse {
    pub fn new(code: u16, messages: Vec<String>) -> Self {
        Self { code, messages }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn response_code(&self) -> u16 {
        self.code
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Attribute endpoints of the remote indexing service.
#[async_trait]
pub trait IndexingApi: Send + Sync {
    /// Fetches every attribute registered for the account.
    async fn list_attributes(
        &self,
        credentials: &AccountCredentials,
    ) -> ApiResult<Vec<RemoteAttribute>>;

    /// Creates or replaces an attribute.
    async fn put_attribute(
        &self,
        credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
    ) -> ApiResult<ApiResponse>;

    /// Removes an attribute.
    async fn delete_attribute(
        &self,
        credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
    ) -> ApiResult<ApiResponse>;
}

/// Checks credential format before anything is sent.
///
/// The JS API key has the form `<prefix>-<digits>`; the REST auth key is at
/// least 10 base64 characters.
pub fn validate_credentials(credentials: &AccountCredentials) -> ApiResult<()> {
    let js_valid = credentials
        .js_api_key
        .split_once('-')
        .is_some_and(|(prefix, digits)| {
            !prefix.is_empty()
                && prefix.chars().all(|c| c.is_ascii_lowercase())
                && !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
        });
    if !js_valid {
        return Err(ApiError::InvalidCredentials(format!(
            "JS API key {:?} does not match <prefix>-<digits>",
            credentials.js_api_key
        )));
    }

    let rest = &credentials.rest_auth_key;
    let rest_valid = rest.len() >= 10
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
    if !rest_valid {
        return Err(ApiError::InvalidCredentials(
            "REST auth key must be at least 10 base64 characters".to_string(),
        ));
    }
    Ok(())
}
