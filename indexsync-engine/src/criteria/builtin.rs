use super::{CurrentValueSource, RequiresUpdateCriteria};
use indexsync_types::IndexingRecord;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

fn snapshot_value<'a>(record: &'a IndexingRecord, identifier: &str) -> Option<&'a Value> {
    record
        .requires_update_orig_values
        .get(identifier)
        .filter(|value| !value.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stale when a number moved by more than `tolerance`.
pub struct NumericToleranceCriteria {
    identifier: String,
    tolerance: f64,
    source: Arc<dyn CurrentValueSource>,
}

impl NumericToleranceCriteria {
    pub fn new(
        identifier: impl Into<String>,
        tolerance: f64,
        source: Arc<dyn CurrentValueSource>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            tolerance: tolerance.abs(),
            source,
        }
    }
}

impl RequiresUpdateCriteria for NumericToleranceCriteria {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn execute(&self, record: &IndexingRecord) -> bool {
        let current = self.current_value(record).filter(|v| !v.is_null());
        let snapshot = snapshot_value(record, &self.identifier);
        match (snapshot.and_then(as_number), current.as_ref().and_then(as_number)) {
            (Some(before), Some(now)) => (now - before).abs() > self.tolerance,
            _ => snapshot != current.as_ref(),
        }
    }

    fn current_value(&self, record: &IndexingRecord) -> Option<Value> {
        self.source.current_value(record, &self.identifier)
    }
}

/// Stale when the members of a collection changed, ignoring order.
pub struct SetEqualityCriteria {
    identifier: String,
    source: Arc<dyn CurrentValueSource>,
}

impl SetEqualityCriteria {
    pub fn new(identifier: impl Into<String>, source: Arc<dyn CurrentValueSource>) -> Self {
        Self {
            identifier: identifier.into(),
            source,
        }
    }

    fn members(value: Option<&Value>) -> BTreeSet<String> {
        match value {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(items)) => items.iter().map(Self::member).collect(),
            Some(scalar) => BTreeSet::from([Self::member(scalar)]),
        }
    }

    fn member(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl RequiresUpdateCriteria for SetEqualityCriteria {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn execute(&self, record: &IndexingRecord) -> bool {
        let current = self.current_value(record);
        Self::members(snapshot_value(record, &self.identifier)) != Self::members(current.as_ref())
    }

    fn current_value(&self, record: &IndexingRecord) -> Option<Value> {
        self.source.current_value(record, &self.identifier)
    }
}

/// Stale on any change to the JSON value.
pub struct ExactValueCriteria {
    identifier: String,
    source: Arc<dyn CurrentValueSource>,
}

impl ExactValueCriteria {
    pub fn new(identifier: impl Into<String>, source: Arc<dyn CurrentValueSource>) -> Self {
        Self {
            identifier: identifier.into(),
            source,
        }
    }
}

impl RequiresUpdateCriteria for ExactValueCriteria {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn execute(&self, record: &IndexingRecord) -> bool {
        let current = self.current_value(record).filter(|v| !v.is_null());
        snapshot_value(record, &self.identifier) != current.as_ref()
    }

    fn current_value(&self, record: &IndexingRecord) -> Option<Value> {
        self.source.current_value(record, &self.identifier)
    }
}
