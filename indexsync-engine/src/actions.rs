//! Remote push of a single attribute.
//!
//! Remote failures come back as an unsuccessful [`SyncResult`]; only
//! credential rejection is an error. Successful pushes are announced to
//! the registered [`SyncEventHandler`]s.

use crate::error::{IndexingError, IndexingResult};
use crate::events::{
    SyncEvent, SyncEventHandler, ATTRIBUTE_DELETED_EVENT, ATTRIBUTE_UPDATED_EVENT,
    PAYLOAD_FINGERPRINT,
};
use crate::mapping::fingerprint;
use indexsync_remote::{ApiError, IndexingApi};
use indexsync_types::{AccountCredentials, RemoteAttribute, SyncResult};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperation {
    /// Create or replace.
    Update,
    Delete,
}

impl AttributeOperation {
    pub const fn event_name(&self) -> &'static str {
        match self {
            AttributeOperation::Update => ATTRIBUTE_UPDATED_EVENT,
            AttributeOperation::Delete => ATTRIBUTE_DELETED_EVENT,
        }
    }
}

/// Pushes one attribute change and normalizes the outcome.
#[derive(Clone)]
pub struct AttributeSyncAction {
    operation: AttributeOperation,
    api: Arc<dyn IndexingApi>,
    handlers: Vec<Arc<dyn SyncEventHandler>>,
}

/// Creates or replaces a remote attribute.
pub type UpdateAttributeAction = AttributeSyncAction;

/// Removes a remote attribute.
pub type DeleteAttributeAction = AttributeSyncAction;

impl AttributeSyncAction {
    pub fn update(api: Arc<dyn IndexingApi>) -> UpdateAttributeAction {
        Self::new(AttributeOperation::Update, api)
    }

    pub fn delete(api: Arc<dyn IndexingApi>) -> DeleteAttributeAction {
        Self::new(AttributeOperation::Delete, api)
    }

    fn new(operation: AttributeOperation, api: Arc<dyn IndexingApi>) -> Self {
        Self {
            operation,
            api,
            handlers: Vec::new(),
        }
    }

    /// Registers a handler for this action's success event.
    pub fn with_handler(mut self, handler: Arc<dyn SyncEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn operation(&self) -> AttributeOperation {
        self.operation
    }

    pub async fn execute(
        &self,
        credentials: &AccountCredentials,
        attribute: &RemoteAttribute,
        target_type: &str,
    ) -> IndexingResult<SyncResult> {
        let outcome = match self.operation {
            AttributeOperation::Update => self.api.put_attribute(credentials, attribute).await,
            AttributeOperation::Delete => self.api.delete_attribute(credentials, attribute).await,
        };

        let response = match outcome {
            Ok(response) => response,
            Err(ApiError::InvalidCredentials(msg)) => {
                error!(
                    js_api_key = %credentials.js_api_key,
                    error = %msg,
                    "remote service rejected account credentials"
                );
                return Err(IndexingError::InvalidAccountCredentials(msg));
            }
            Err(e) => {
                warn!(
                    attribute = %attribute.attribute_name,
                    operation = ?self.operation,
                    code = e.code(),
                    error = %e,
                    "attribute sync failed"
                );
                return Ok(SyncResult::failure(e.code(), e.messages()));
            }
        };

        let code = response.response_code();
        let messages = response.messages().to_vec();
        if !response.is_success() {
            warn!(
                attribute = %attribute.attribute_name,
                operation = ?self.operation,
                code,
                messages = ?messages,
                "remote service rejected attribute"
            );
            return Ok(SyncResult::failure(code, messages));
        }

        info!(
            attribute = %attribute.attribute_name,
            operation = ?self.operation,
            code,
            "attribute synced"
        );
        let mut event = SyncEvent::attribute(
            self.operation.event_name(),
            &attribute.attribute_name,
            &credentials.js_api_key,
            target_type,
        );
        if self.operation == AttributeOperation::Update {
            event = event.with(PAYLOAD_FINGERPRINT, fingerprint(attribute));
        }
        self.notify(&event);
        Ok(SyncResult::success(code, messages))
    }

    fn notify(&self, event: &SyncEvent) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle(event) {
                warn!(event = event.name.as_str(), error = %e, "sync event handler failed");
            }
        }
    }
}
