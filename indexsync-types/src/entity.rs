use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A host catalog entity (product, category, page) as discovery sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub enabled: bool,
    pub visible_in_search: bool,
    /// Scope ids the entity is assigned to.
    #[serde(default)]
    pub scope_ids: BTreeSet<u32>,
    /// Live field values, keyed by criteria identifier.
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl CatalogEntity {
    /// An enabled, searchable entity assigned to no scope.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            parent_id: None,
            enabled: true,
            visible_in_search: true,
            scope_ids: BTreeSet::new(),
            values: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_scopes(mut self, scope_ids: impl IntoIterator<Item = u32>) -> Self {
        self.scope_ids = scope_ids.into_iter().collect();
        self
    }

    pub fn with_value(mut self, identifier: impl Into<String>, value: Value) -> Self {
        self.values.insert(identifier.into(), value);
        self
    }
}
