//! Requires-update evaluation for already-indexed entities.
//!
//! Each record keeps a snapshot of the values its remote representation was
//! built from, keyed by criteria identifier (`price`, `stock`, ...). The
//! evaluator asks the criteria registered for each identifier whether the
//! live value has drifted from that snapshot.

mod builtin;

pub use builtin::{ExactValueCriteria, NumericToleranceCriteria, SetEqualityCriteria};

use crate::config::{CriteriaComparison, CriteriaConfig};
use indexsync_types::{CatalogEntity, IndexingRecord};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Compares one field of a record against its live value.
pub trait RequiresUpdateCriteria: Send + Sync {
    fn identifier(&self) -> &str;

    /// Whether the live value differs from the record's snapshot enough to
    /// require a re-push.
    fn execute(&self, record: &IndexingRecord) -> bool;

    /// The live value, as stored in a fresh snapshot.
    fn current_value(&self, record: &IndexingRecord) -> Option<Value>;
}

/// Supplies the live value of a field for a record's target.
pub trait CurrentValueSource: Send + Sync {
    fn current_value(&self, record: &IndexingRecord, identifier: &str) -> Option<Value>;
}

type TargetKey = (String, String, Option<String>);

/// [`CurrentValueSource`] reading the values discovery stored on the record.
///
/// Outlives the process that ran discovery, so a push recorded later still
/// snapshots what the remote copy was built from.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoredValueSource;

impl CurrentValueSource for StoredValueSource {
    fn current_value(&self, record: &IndexingRecord, identifier: &str) -> Option<Value> {
        record.current_values.get(identifier).cloned()
    }
}

fn target_key(entity: &CatalogEntity) -> TargetKey {
    (
        entity.entity_type.clone(),
        entity.id.clone(),
        entity.parent_id.clone(),
    )
}

/// [`CurrentValueSource`] over the `values` of loaded catalog entities.
#[derive(Default)]
pub struct MapCurrentValueSource {
    values: RwLock<HashMap<TargetKey, Map<String, Value>>>,
}

impl MapCurrentValueSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the values of `entities`, replacing those of entities already
    /// loaded. Entities not in `entities` keep their values.
    pub fn load(&self, entities: &[CatalogEntity]) {
        let mut values = match self.values.write() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        for entity in entities {
            values.insert(target_key(entity), entity.values.clone());
        }
    }

    pub fn insert(&self, entity: &CatalogEntity) {
        self.load(std::slice::from_ref(entity));
    }
}

impl CurrentValueSource for MapCurrentValueSource {
    fn current_value(&self, record: &IndexingRecord, identifier: &str) -> Option<Value> {
        let key = (
            record.key.target_type.clone(),
            record.key.target_id.clone(),
            record.key.target_parent_id.clone(),
        );
        let values = match self.values.read() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        values
            .get(&key)
            .and_then(|fields| fields.get(identifier))
            .cloned()
    }
}

/// Criteria keyed by `(target_type, identifier)`, in registration order.
#[derive(Default)]
pub struct CriteriaRegistry {
    criteria: BTreeMap<(String, String), Vec<Arc<dyn RequiresUpdateCriteria>>>,
}

impl CriteriaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry described by configuration, reading live values
    /// from `source`.
    pub fn from_config(configs: &[CriteriaConfig], source: Arc<dyn CurrentValueSource>) -> Self {
        let mut registry = Self::new();
        for cfg in configs {
            let criteria: Arc<dyn RequiresUpdateCriteria> = match cfg.comparison {
                CriteriaComparison::Numeric { tolerance } => Arc::new(
                    NumericToleranceCriteria::new(cfg.identifier.clone(), tolerance, source.clone()),
                ),
                CriteriaComparison::Set => Arc::new(SetEqualityCriteria::new(
                    cfg.identifier.clone(),
                    source.clone(),
                )),
                CriteriaComparison::Exact => Arc::new(ExactValueCriteria::new(
                    cfg.identifier.clone(),
                    source.clone(),
                )),
            };
            registry.register(cfg.target_type.clone(), criteria);
        }
        registry
    }

    pub fn register(
        &mut self,
        target_type: impl Into<String>,
        criteria: Arc<dyn RequiresUpdateCriteria>,
    ) -> &mut Self {
        let key = (target_type.into(), criteria.identifier().to_string());
        self.criteria.entry(key).or_default().push(criteria);
        self
    }

    pub fn get(&self, target_type: &str, identifier: &str) -> &[Arc<dyn RequiresUpdateCriteria>] {
        self.criteria
            .get(&(target_type.to_string(), identifier.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Identifiers with at least one criteria for `target_type`, sorted.
    pub fn identifiers(&self, target_type: &str) -> Vec<&str> {
        self.criteria
            .keys()
            .filter(|(registered_type, _)| registered_type == target_type)
            .map(|(_, identifier)| identifier.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Decides whether an indexed record's remote copy is stale.
pub struct RequiresUpdateEvaluator {
    registry: Arc<CriteriaRegistry>,
}

impl RequiresUpdateEvaluator {
    pub fn new(registry: Arc<CriteriaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CriteriaRegistry {
        &self.registry
    }

    /// True on the first criteria reporting drift for any identifier in
    /// the record's snapshot. An empty snapshot is never stale.
    pub fn execute(&self, record: &IndexingRecord) -> bool {
        for identifier in record.requires_update_orig_values.keys() {
            let criteria = self.registry.get(record.target_type(), identifier);
            if criteria.is_empty() {
                debug!(
                    target_type = record.target_type(),
                    identifier = identifier.as_str(),
                    "no requires-update criteria registered; skipping"
                );
                continue;
            }
            if criteria.iter().any(|c| c.execute(record)) {
                debug!(
                    record = %record.key,
                    identifier = identifier.as_str(),
                    "record requires update"
                );
                return true;
            }
        }
        false
    }

    /// The subset of `values` tracked by criteria for `target_type`, as
    /// stored in [`IndexingRecord::current_values`].
    pub fn observe(&self, target_type: &str, values: &Map<String, Value>) -> Map<String, Value> {
        self.registry
            .identifiers(target_type)
            .into_iter()
            .filter_map(|identifier| {
                values
                    .get(identifier)
                    .map(|value| (identifier.to_string(), value.clone()))
            })
            .collect()
    }

    /// Captures live values for every identifier registered for
    /// `target_type`. Identifiers without a live value are stored as null.
    pub fn snapshot(&self, target_type: &str, record: &IndexingRecord) -> Map<String, Value> {
        let mut snapshot = Map::new();
        for identifier in self.registry.identifiers(target_type) {
            let value = self
                .registry
                .get(target_type, identifier)
                .iter()
                .find_map(|criteria| criteria.current_value(record));
            if value.is_none() {
                warn!(
                    record = %record.key,
                    identifier,
                    "no live value for requires-update criteria"
                );
            }
            snapshot.insert(identifier.to_string(), value.unwrap_or(Value::Null));
        }
        snapshot
    }
}
