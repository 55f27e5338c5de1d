//! Shared test helpers for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use indexsync_engine::{
    AttributeMapper, AttributeTypeMapper, RemoteAttributeBuilder, StaticScopeRegistry,
};
use indexsync_remote::{ApiError, ApiResponse, ApiResult, IndexingApi};
use indexsync_types::{
    AccountCredentials, AttributeDefinition, BackendType, FrontendInput, RemoteAttribute, Scope,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const API_KEY: &str = "js-1001";
pub const REST_KEY: &str = "ABCDEFGHIJ1234567890";

pub fn credentials() -> AccountCredentials {
    AccountCredentials::new(API_KEY, REST_KEY)
}

pub fn default_scope() -> Scope {
    Scope::new(1, "default")
}

/// One scope (id 1) bound to [`API_KEY`].
pub fn registry() -> StaticScopeRegistry {
    let mut registry = StaticScopeRegistry::new();
    registry.register(default_scope(), credentials());
    registry
}

/// Builder for `product` attributes with the `ext_` prefix.
pub fn builder() -> RemoteAttributeBuilder {
    RemoteAttributeBuilder::new(
        Arc::new(AttributeMapper::new("product", "ext_", BTreeMap::new())),
        Arc::new(AttributeTypeMapper::default()),
    )
}

pub fn color() -> AttributeDefinition {
    AttributeDefinition::new(10, "color")
        .with_label("Color")
        .with_types(BackendType::Varchar, FrontendInput::Multiselect)
        .indexable(true)
}

pub fn weight() -> AttributeDefinition {
    AttributeDefinition::new(11, "weight")
        .with_types(BackendType::Decimal, FrontendInput::Weight)
        .indexable(true)
}

/// A scripted outcome for one write call.
pub enum Reply {
    Status(u16, Vec<String>),
    Error(ApiError),
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    Put(String),
    Delete(String),
}

/// In-memory [`IndexingApi`] that records calls and replays scripted
/// replies. Writes succeed with 200 once the script runs out.
#[derive(Default)]
pub struct ScriptedApi {
    pub calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
    remote: Mutex<Vec<RemoteAttribute>>,
    pub list_count: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_remote(attributes: Vec<RemoteAttribute>) -> Arc<Self> {
        let api = Self::default();
        *api.remote.lock().unwrap() = attributes;
        Arc::new(api)
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lists(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    async fn next_reply(&self) -> ApiResult<ApiResponse> {
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(ApiResponse::new(200, Vec::new())),
            Some(Reply::Status(code, messages)) => Ok(ApiResponse::new(code, messages)),
            Some(Reply::Error(e)) => Err(e),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ApiResponse::new(200, Vec::new()))
            }
        }
    }
}

#[async_trait]
impl IndexingApi for ScriptedApi {
    async fn list_attributes(
        &self,
        credentials: &AccountCredentials,
    ) -> ApiResult<Vec<RemoteAttribute>> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push(Call::List(credentials.js_api_key.clone()));
        Ok(self.remote.lock().unwrap().clone())
    }

    async fn put_attribute(
        &self,
        _credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
    ) -> ApiResult<ApiResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Put(attribute.attribute_name.clone()));
        self.next_reply().await
    }

    async fn delete_attribute(
        &self,
        _credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
    ) -> ApiResult<ApiResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(attribute.attribute_name.clone()));
        self.next_reply().await
    }
}
