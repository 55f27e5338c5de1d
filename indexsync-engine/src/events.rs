//! Post-sync domain events.
//!
//! Sync actions report successful pushes through [`SyncEventHandler`]s and
//! know nothing about what the handlers do. [`AttributeRecordUpdater`]
//! advances the attribute's indexing record; [`BroadcastEventBus`] fans
//! events out to in-process subscribers.

use crate::error::IndexingResult;
use crate::mapping::AttributeMapper;
use chrono::{DateTime, Utc};
use indexsync_store::IndexingRecordStore;
use indexsync_types::{Action, RecordKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const ATTRIBUTE_UPDATED_EVENT: &str = "indexsync.attribute.updated";
pub const ATTRIBUTE_DELETED_EVENT: &str = "indexsync.attribute.deleted";

pub const PAYLOAD_ATTRIBUTE_NAME: &str = "attribute_name";
pub const PAYLOAD_API_KEY: &str = "api_key";
pub const PAYLOAD_TARGET_TYPE: &str = "target_type";
/// Fingerprint of the pushed definition; absent on deletes.
pub const PAYLOAD_FINGERPRINT: &str = "fingerprint";

/// Snapshot key holding an attribute record's definition fingerprint.
pub const FINGERPRINT_KEY: &str = "fingerprint";

const DEFAULT_CAPACITY: usize = 256;

/// A named event with a flat string payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub name: String,
    pub payload: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Event for a pushed attribute.
    pub fn attribute(name: &str, attribute_name: &str, api_key: &str, target_type: &str) -> Self {
        Self::new(name)
            .with(PAYLOAD_ATTRIBUTE_NAME, attribute_name)
            .with(PAYLOAD_API_KEY, api_key)
            .with(PAYLOAD_TARGET_TYPE, target_type)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

/// Receives events synchronously after a successful remote call.
pub trait SyncEventHandler: Send + Sync {
    fn handle(&self, event: &SyncEvent) -> IndexingResult<()>;
}

/// In-process fan-out of [`SyncEvent`]s.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes to current subscribers. Dropped when there are none.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SyncEventHandler for BroadcastEventBus {
    fn handle(&self, event: &SyncEvent) -> IndexingResult<()> {
        self.publish(event.clone());
        Ok(())
    }
}

/// Marks an attribute's indexing record as synced when its push succeeds.
pub struct AttributeRecordUpdater {
    store: Arc<dyn IndexingRecordStore>,
    names: Arc<AttributeMapper>,
}

impl AttributeRecordUpdater {
    pub fn new(store: Arc<dyn IndexingRecordStore>, names: Arc<AttributeMapper>) -> Self {
        Self { store, names }
    }
}

impl SyncEventHandler for AttributeRecordUpdater {
    fn handle(&self, event: &SyncEvent) -> IndexingResult<()> {
        let deleted = match event.name.as_str() {
            ATTRIBUTE_UPDATED_EVENT => false,
            ATTRIBUTE_DELETED_EVENT => true,
            _ => return Ok(()),
        };
        let (Some(attribute_name), Some(api_key), Some(target_type)) = (
            event.get(PAYLOAD_ATTRIBUTE_NAME),
            event.get(PAYLOAD_API_KEY),
            event.get(PAYLOAD_TARGET_TYPE),
        ) else {
            warn!(event = event.name.as_str(), "attribute event missing payload fields");
            return Ok(());
        };
        if target_type != self.names.entity_type() {
            return Ok(());
        }

        let code = self.names.reverse_for_code(attribute_name);
        let key = RecordKey::attribute(target_type, code.as_str(), api_key);
        let Some(mut record) = self.store.find(&key)? else {
            warn!(record = %key, "no indexing record for synced attribute");
            return Ok(());
        };

        let action = if deleted {
            Action::Delete
        } else if record.next_action == Action::Add {
            Action::Add
        } else {
            Action::Update
        };
        let mut snapshot = Map::new();
        if let (false, Some(fingerprint)) = (deleted, event.get(PAYLOAD_FINGERPRINT)) {
            snapshot.insert(FINGERPRINT_KEY.to_string(), Value::String(fingerprint.to_string()));
        }
        record.record_sync_success(action, event.timestamp, snapshot);
        self.store.save(&record)?;
        debug!(record = %key, %action, "attribute record marked as synced");
        Ok(())
    }
}
