//! Per-API-key cache of the remote attribute list.
//!
//! Entries are whole JSON payloads keyed by a hash of the API key; a newer
//! write replaces the previous list. Every entry carries
//! [`ATTRIBUTES_CACHE_TAG`] so the whole cache can be flushed at once.

use crate::error::{IndexingError, IndexingResult};
use crate::scope::{resolve_binding, ScopeProvider};
use indexsync_remote::IndexingApi;
use indexsync_store::CacheStore;
use indexsync_types::RemoteAttribute;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ATTRIBUTES_CACHE_TAG: &str = "indexsync_attributes";

pub const ATTRIBUTES_CACHE_TTL_SECS: i64 = 86_400;

const CACHE_KEY_PREFIX: &str = "indexsync_attributes_";

/// Derives cache keys that do not reveal the API key.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributesCacheKeyProvider;

impl AttributesCacheKeyProvider {
    pub fn get(&self, api_key: &str) -> String {
        let digest = Sha256::digest(api_key.as_bytes());
        format!("{CACHE_KEY_PREFIX}{}", hex::encode(digest))
    }
}

pub struct CacheAttributesAction {
    cache: Arc<dyn CacheStore>,
    keys: AttributesCacheKeyProvider,
}

impl CacheAttributesAction {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            keys: AttributesCacheKeyProvider,
        }
    }

    /// Stores `attributes` as the list for `api_key`, replacing any
    /// previous entry.
    pub fn execute(&self, attributes: &[RemoteAttribute], api_key: &str) -> IndexingResult<()> {
        let payload = serde_json::to_string(attributes)?;
        self.cache
            .save(
                &self.keys.get(api_key),
                &payload,
                &[ATTRIBUTES_CACHE_TAG],
                chrono::Duration::seconds(ATTRIBUTES_CACHE_TTL_SECS),
            )
            .map_err(IndexingError::Cache)?;
        debug!(count = attributes.len(), "cached remote attributes");
        Ok(())
    }
}

pub struct CachedAttributesProvider {
    cache: Arc<dyn CacheStore>,
    keys: AttributesCacheKeyProvider,
}

impl CachedAttributesProvider {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            keys: AttributesCacheKeyProvider,
        }
    }

    /// The cached list for `api_key`, or `None` on a miss. A miss never
    /// means "no attributes".
    pub fn get(&self, api_key: &str) -> IndexingResult<Option<Vec<RemoteAttribute>>> {
        if !self.cache.is_enabled(ATTRIBUTES_CACHE_TAG) {
            return Ok(None);
        }
        let Some(payload) = self
            .cache
            .load(&self.keys.get(api_key))
            .map_err(IndexingError::Cache)?
        else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(attributes) => Ok(Some(attributes)),
            Err(e) => {
                warn!(error = %e, "discarding undecodable attribute cache entry");
                Ok(None)
            }
        }
    }
}

pub struct ClearAttributesCacheAction {
    cache: Arc<dyn CacheStore>,
    keys: AttributesCacheKeyProvider,
}

impl ClearAttributesCacheAction {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            keys: AttributesCacheKeyProvider,
        }
    }

    /// Removes the entries for `api_keys`, or every attribute entry when
    /// `api_keys` is empty.
    pub fn execute(&self, api_keys: &[String]) -> IndexingResult<()> {
        if !self.cache.is_enabled(ATTRIBUTES_CACHE_TAG) {
            debug!("attribute cache disabled; nothing to clear");
            return Ok(());
        }
        if api_keys.is_empty() {
            self.cache
                .clean_tag(ATTRIBUTES_CACHE_TAG)
                .map_err(IndexingError::Cache)?;
            info!("cleared attribute cache");
            return Ok(());
        }
        for api_key in api_keys {
            self.cache
                .remove(&self.keys.get(api_key))
                .map_err(IndexingError::Cache)?;
        }
        info!(count = api_keys.len(), "cleared attribute cache entries");
        Ok(())
    }
}

/// Cache-aside access to the remote attribute list.
pub struct AttributesProvider {
    cached: CachedAttributesProvider,
    store_action: CacheAttributesAction,
    scopes: Arc<dyn ScopeProvider>,
    api: Arc<dyn IndexingApi>,
}

impl AttributesProvider {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        scopes: Arc<dyn ScopeProvider>,
        api: Arc<dyn IndexingApi>,
    ) -> Self {
        Self {
            cached: CachedAttributesProvider::new(cache.clone()),
            store_action: CacheAttributesAction::new(cache),
            scopes,
            api,
        }
    }

    /// Attributes for `api_key`, fetched from the remote service on a cache
    /// miss. An API key with no scope fails before any remote call.
    pub async fn get(&self, api_key: &str) -> IndexingResult<Vec<RemoteAttribute>> {
        if let Some(attributes) = self.cached.get(api_key)? {
            return Ok(attributes);
        }

        let binding = resolve_binding(self.scopes.as_ref(), api_key)?;
        debug!(scope = %binding.scope, "attribute cache miss; fetching from remote");
        let attributes = self.api.list_attributes(&binding.credentials).await?;
        self.store_action.execute(&attributes, api_key)?;
        Ok(attributes)
    }
}
