//! Per-target indexing state.

use crate::{Action, RecordId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// What a record tracks: a catalog entity or an attribute definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Entity,
    Attribute,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entity",
            RecordKind::Attribute => "attribute",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(RecordKind::Entity),
            "attribute" => Ok(RecordKind::Attribute),
            other => Err(crate::Error::InvalidRecordKind(other.to_string())),
        }
    }
}

/// Natural key of an indexing record. At most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub target_type: String,
    pub target_id: String,
    pub target_parent_id: Option<String>,
    pub api_key: String,
}

impl RecordKey {
    /// Key for a catalog entity record.
    pub fn entity(
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Entity,
            target_type: target_type.into(),
            target_id: target_id.into(),
            target_parent_id: None,
            api_key: api_key.into(),
        }
    }

    /// Key for an attribute definition record.
    ///
    /// `target_type` is the entity type the attribute belongs to and
    /// `attribute_code` is the host's local attribute code.
    pub fn attribute(
        target_type: impl Into<String>,
        attribute_code: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Attribute,
            target_type: target_type.into(),
            target_id: attribute_code.into(),
            target_parent_id: None,
            api_key: api_key.into(),
        }
    }

    /// Sets the parent target (e.g. a configurable product for a variant).
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.target_parent_id = Some(parent_id.into());
        self
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.target_type, self.target_id)?;
        if let Some(parent) = &self.target_parent_id {
            write!(f, "<{parent}")?;
        }
        Ok(())
    }
}

/// Values for a record that discovery is about to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIndexingRecord {
    pub key: RecordKey,
    pub is_indexable: bool,
    pub next_action: Action,
    pub requires_update: bool,
    pub requires_update_orig_values: Map<String, Value>,
    pub current_values: Map<String, Value>,
}

impl NewIndexingRecord {
    /// A record that has never been synced, with the given pending action.
    pub fn new(key: RecordKey, is_indexable: bool, next_action: Action) -> Self {
        Self {
            key,
            is_indexable,
            next_action,
            requires_update: false,
            requires_update_orig_values: Map::new(),
            current_values: Map::new(),
        }
    }

    pub fn with_current_values(mut self, values: Map<String, Value>) -> Self {
        self.current_values = values;
        self
    }
}

/// Sync state of one target for one API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingRecord {
    pub id: RecordId,
    pub key: RecordKey,
    pub is_indexable: bool,
    pub next_action: Action,
    pub last_action: Action,
    pub last_action_timestamp: Option<DateTime<Utc>>,
    pub lock_timestamp: Option<DateTime<Utc>>,
    pub requires_update: bool,
    /// Criteria identifier to the value the remote copy was built from.
    /// For attribute records this holds the definition fingerprint.
    pub requires_update_orig_values: Map<String, Value>,
    /// The same identifiers as observed by the last discovery run.
    #[serde(default)]
    pub current_values: Map<String, Value>,
}

impl IndexingRecord {
    pub fn target_type(&self) -> &str {
        &self.key.target_type
    }

    pub fn target_id(&self) -> &str {
        &self.key.target_id
    }

    pub fn api_key(&self) -> &str {
        &self.key.api_key
    }

    /// Whether the target is currently present in the remote index, judged by
    /// the last action that completed.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.last_action.leaves_indexed()
    }

    /// Whether another worker holds a lock that has not yet gone stale.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.lock_timestamp
            .is_some_and(|locked_at| locked_at > now - stale_after)
    }

    /// Applies the outcome of a successful remote call.
    ///
    /// `snapshot` replaces the values used for later staleness checks; pass
    /// an empty map after a delete.
    pub fn record_sync_success(
        &mut self,
        action: Action,
        at: DateTime<Utc>,
        snapshot: Map<String, Value>,
    ) {
        self.last_action = action;
        self.last_action_timestamp = Some(at);
        self.next_action = Action::NoAction;
        self.requires_update = false;
        self.requires_update_orig_values = snapshot;
    }
}
