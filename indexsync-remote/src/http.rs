//! HTTP implementation of [`IndexingApi`].

use crate::api::{validate_credentials, ApiResponse, IndexingApi};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use indexsync_types::{AccountCredentials, RemoteAttribute};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Remote indexing service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the indexing API (e.g. `https://indexing.example.com`).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://indexing.example.com".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Error body returned by the service.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

/// reqwest-backed attribute API client.
pub struct HttpIndexingApi {
    config: RemoteConfig,
    client: Client,
}

impl HttpIndexingApi {
    pub fn new(config: RemoteConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn attributes_url(&self) -> String {
        format!("{}/v2/attributes", self.config.base_url.trim_end_matches('/'))
    }

    fn attribute_url(&self, attribute_name: &str) -> String {
        format!("{}/{}", self.attributes_url(), urlencoding::encode(attribute_name))
    }

    fn authorize(builder: RequestBuilder, credentials: &AccountCredentials) -> RequestBuilder {
        builder
            .header("X-Api-Key", &credentials.js_api_key)
            .bearer_auth(&credentials.rest_auth_key)
    }

    /// Converts a write response into an [`ApiResponse`], collecting the
    /// service's messages on failure.
    async fn into_api_response(response: Response) -> ApiResult<ApiResponse> {
        let code = response.status().as_u16();
        let text = response.text().await?;
        if (200..300).contains(&code) {
            return Ok(ApiResponse::new(code, Vec::new()));
        }
        Ok(ApiResponse::new(code, error_messages(&text)))
    }
}

/// Extracts messages from an error body, falling back to the raw text.
fn error_messages(body: &str) -> Vec<String> {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let mut messages: Vec<String> = parsed.message.into_iter().collect();
            messages.extend(parsed.errors);
            messages
        }
        Err(_) if body.trim().is_empty() => Vec::new(),
        Err(_) => vec![body.trim().to_string()],
    }
}

#[async_trait]
impl IndexingApi for HttpIndexingApi {
    async fn list_attributes(
        &self,
        credentials: &AccountCredentials,
    ) -> ApiResult<Vec<RemoteAttribute>> {
        validate_credentials(credentials)?;
        debug!(js_api_key = %credentials.js_api_key, "listing remote attributes");

        let response = Self::authorize(self.client.get(self.attributes_url()), credentials)
            .send()
            .await?;
        let code = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&code) {
            return Err(ApiError::BadResponse {
                code,
                messages: error_messages(&text),
            });
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("attribute list: {e}")))
    }

    async fn put_attribute(
        &self,
        credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
    ) -> ApiResult<ApiResponse> {
        validate_credentials(credentials)?;
        debug!(attribute = %attribute.attribute_name, "putting remote attribute");

        let response = Self::authorize(
            self.client.put(self.attribute_url(&attribute.attribute_name)),
            credentials,
        )
        .json(attribute)
        .send()
        .await?;
        Self::into_api_response(response).await
    }

    async fn delete_attribute(
        &self,
        credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
    ) -> ApiResult<ApiResponse> {
        validate_credentials(credentials)?;
        debug!(attribute = %attribute.attribute_name, "deleting remote attribute");

        let response = Self::authorize(
            self.client.delete(self.attribute_url(&attribute.attribute_name)),
            credentials,
        )
        .send()
        .await?;
        Self::into_api_response(response).await
    }
}
