use chrono::Utc;
use indexsync_engine::criteria::{
    ExactValueCriteria, MapCurrentValueSource, NumericToleranceCriteria, SetEqualityCriteria,
    StoredValueSource,
};
use indexsync_engine::{
    CriteriaComparison, CriteriaConfig, CriteriaRegistry, CurrentValueSource,
    RequiresUpdateCriteria, RequiresUpdateEvaluator,
};
use indexsync_types::{Action, CatalogEntity, IndexingRecord, RecordId, RecordKey};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn record(snapshot: Value) -> IndexingRecord {
    let Value::Object(snapshot) = snapshot else {
        panic!("snapshot must be an object");
    };
    IndexingRecord {
        id: RecordId::new(1),
        key: RecordKey::entity("product", "42", "js-1001"),
        is_indexable: true,
        next_action: Action::NoAction,
        last_action: Action::Add,
        last_action_timestamp: Some(Utc::now()),
        lock_timestamp: None,
        requires_update: false,
        requires_update_orig_values: snapshot,
        current_values: Map::new(),
    }
}

fn source_with(values: Value) -> Arc<MapCurrentValueSource> {
    let mut entity = CatalogEntity::new("product", "42");
    if let Value::Object(map) = values {
        entity.values = map;
    }
    let source = Arc::new(MapCurrentValueSource::new());
    source.load(&[entity]);
    source
}

/// Criteria with a fixed verdict that counts its invocations.
struct Verdict {
    identifier: &'static str,
    stale: bool,
    calls: Arc<AtomicUsize>,
}

impl RequiresUpdateCriteria for Verdict {
    fn identifier(&self) -> &str {
        self.identifier
    }

    fn execute(&self, _record: &IndexingRecord) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.stale
    }

    fn current_value(&self, _record: &IndexingRecord) -> Option<Value> {
        Some(json!(self.stale))
    }
}

fn verdict(identifier: &'static str, stale: bool) -> (Arc<Verdict>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Arc::new(Verdict {
            identifier,
            stale,
            calls: calls.clone(),
        }),
        calls,
    )
}

// ── Current values ──────────────────────────────────────────────

#[test]
fn map_source_matches_on_type_id_and_parent() {
    let source = MapCurrentValueSource::new();
    source.load(&[
        CatalogEntity::new("product", "42").with_value("price", json!(10)),
        CatalogEntity::new("product", "42")
            .with_parent("7")
            .with_value("price", json!(12)),
    ]);

    let plain = record(json!({}));
    assert_eq!(source.current_value(&plain, "price"), Some(json!(10)));
    assert_eq!(source.current_value(&plain, "stock"), None);

    let mut variant = record(json!({}));
    variant.key = variant.key.with_parent("7");
    assert_eq!(source.current_value(&variant, "price"), Some(json!(12)));
}

#[test]
fn map_source_load_merges_batches() {
    let source = MapCurrentValueSource::new();
    source.load(&[CatalogEntity::new("product", "42").with_value("price", json!(10))]);
    source.load(&[CatalogEntity::new("product", "43").with_value("price", json!(3))]);

    assert_eq!(source.current_value(&record(json!({})), "price"), Some(json!(10)));

    source.load(&[CatalogEntity::new("product", "42").with_value("price", json!(11))]);
    assert_eq!(source.current_value(&record(json!({})), "price"), Some(json!(11)));
}

#[test]
fn stored_source_reads_record_values() {
    let mut stored = record(json!({"price": 10}));
    stored.current_values.insert("price".to_string(), json!(12));

    assert_eq!(StoredValueSource.current_value(&stored, "price"), Some(json!(12)));
    assert_eq!(StoredValueSource.current_value(&stored, "stock"), None);

    let criteria = NumericToleranceCriteria::new("price", 0.5, Arc::new(StoredValueSource));
    assert!(criteria.execute(&stored));
}

#[test]
fn observe_keeps_tracked_identifiers() {
    let source: Arc<dyn CurrentValueSource> = Arc::new(StoredValueSource);
    let mut registry = CriteriaRegistry::new();
    registry.register("product", Arc::new(ExactValueCriteria::new("status", source)));
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(registry));

    let Value::Object(values) = json!({"status": "active", "name": "Mug"}) else {
        unreachable!()
    };
    let observed = evaluator.observe("product", &values);
    assert_eq!(observed.len(), 1);
    assert_eq!(observed.get("status"), Some(&json!("active")));
    assert!(evaluator.observe("category", &values).is_empty());
}

// ── Built-in criteria ───────────────────────────────────────────

#[test]
fn numeric_tolerance() {
    let criteria = NumericToleranceCriteria::new("price", 0.01, source_with(json!({"price": 10.005})));
    assert!(!criteria.execute(&record(json!({"price": 10.0}))));
    assert!(criteria.execute(&record(json!({"price": 9.5}))));
    // Numeric strings compare as numbers.
    assert!(!criteria.execute(&record(json!({"price": "10.00"}))));
}

#[test]
fn numeric_missing_side_is_stale() {
    let present = NumericToleranceCriteria::new("price", 0.0, source_with(json!({"price": 5})));
    assert!(present.execute(&record(json!({"price": null}))));

    let absent = NumericToleranceCriteria::new("price", 0.0, source_with(json!({})));
    assert!(absent.execute(&record(json!({"price": 5}))));
    assert!(!absent.execute(&record(json!({"price": null}))));
}

#[test]
fn set_equality_ignores_order() {
    let criteria = SetEqualityCriteria::new("categories", source_with(json!({"categories": [3, 1, 2]})));
    assert!(!criteria.execute(&record(json!({"categories": [1, 2, 3]}))));
    assert!(criteria.execute(&record(json!({"categories": [1, 2]}))));
}

#[test]
fn set_equality_treats_scalar_as_singleton() {
    let criteria = SetEqualityCriteria::new("tag", source_with(json!({"tag": ["sale"]})));
    assert!(!criteria.execute(&record(json!({"tag": "sale"}))));
}

#[test]
fn exact_value() {
    let criteria = ExactValueCriteria::new("status", source_with(json!({"status": "active"})));
    assert!(!criteria.execute(&record(json!({"status": "active"}))));
    assert!(criteria.execute(&record(json!({"status": "draft"}))));
}

// ── Evaluator ───────────────────────────────────────────────────

#[test]
fn empty_snapshot_is_never_stale() {
    let (stale, calls) = verdict("price", true);
    let mut registry = CriteriaRegistry::new();
    registry.register("product", stale);
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(registry));

    assert!(!evaluator.execute(&record(json!({}))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unregistered_identifiers_are_skipped() {
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(CriteriaRegistry::new()));
    assert!(!evaluator.execute(&record(json!({"price": 1}))));
}

#[test]
fn any_stale_criteria_marks_record_stale() {
    let (fresh, _) = verdict("price", false);
    let (stale, _) = verdict("stock", true);
    let mut registry = CriteriaRegistry::new();
    registry.register("product", fresh).register("product", stale);
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(registry));

    assert!(evaluator.execute(&record(json!({"price": 1, "stock": 2}))));
    assert!(!evaluator.execute(&record(json!({"price": 1}))));
}

#[test]
fn criteria_for_other_target_types_are_ignored() {
    let (stale, calls) = verdict("price", true);
    let mut registry = CriteriaRegistry::new();
    registry.register("category", stale);
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(registry));

    assert!(!evaluator.execute(&record(json!({"price": 1}))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn evaluation_stops_at_first_stale_criteria() {
    let (first, first_calls) = verdict("price", true);
    let (second, second_calls) = verdict("price", true);
    let mut registry = CriteriaRegistry::new();
    registry.register("product", first).register("product", second);
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(registry));

    assert!(evaluator.execute(&record(json!({"price": 1}))));
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn snapshot_collects_registered_identifiers() {
    let source = source_with(json!({"price": 19.99, "categories": [1, 2]}));
    let mut registry = CriteriaRegistry::new();
    registry
        .register("product", Arc::new(NumericToleranceCriteria::new("price", 0.0, source.clone())))
        .register("product", Arc::new(SetEqualityCriteria::new("categories", source.clone())))
        .register("product", Arc::new(ExactValueCriteria::new("status", source)));
    let evaluator = RequiresUpdateEvaluator::new(Arc::new(registry));

    let snapshot = evaluator.snapshot("product", &record(json!({})));
    let mut expected = Map::new();
    expected.insert("categories".to_string(), json!([1, 2]));
    expected.insert("price".to_string(), json!(19.99));
    expected.insert("status".to_string(), Value::Null);
    assert_eq!(snapshot, expected);

    // A fresh snapshot is not stale against the same live values.
    assert!(!evaluator.execute(&record(Value::Object(snapshot))));
}

#[test]
fn registry_from_config() {
    let source: Arc<dyn CurrentValueSource> = source_with(json!({"price": 10}));
    let configs = vec![
        CriteriaConfig {
            target_type: "product".to_string(),
            identifier: "price".to_string(),
            comparison: CriteriaComparison::Numeric { tolerance: 0.5 },
        },
        CriteriaConfig {
            target_type: "product".to_string(),
            identifier: "categories".to_string(),
            comparison: CriteriaComparison::Set,
        },
    ];
    let registry = CriteriaRegistry::from_config(&configs, source);

    assert_eq!(registry.identifiers("product"), vec!["categories", "price"]);
    assert_eq!(registry.get("product", "price").len(), 1);
    assert!(registry.get("category", "price").is_empty());
}
