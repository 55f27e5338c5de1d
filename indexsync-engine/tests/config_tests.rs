mod common;

use common::{credentials, default_scope, registry, API_KEY};
use indexsync_engine::config::{ATTRIBUTE_SYNC_JOB_CODE, DEFAULT_BATCH_SIZE};
use indexsync_engine::scope::resolve_binding;
use indexsync_engine::{
    CriteriaComparison, IndexSyncConfig, IndexingError, ScopeConfig, ScopeProvider,
    StaticScopeRegistry,
};
use indexsync_types::{AccountCredentials, Scope};
use pretty_assertions::assert_eq;
use std::io::Write;

// ── Config ──────────────────────────────────────────────────────

#[test]
fn empty_config_uses_defaults() {
    let config: IndexSyncConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.worker.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.worker.lock_stale_after(), chrono::Duration::minutes(30));
    assert_eq!(config.worker.call_timeout(), std::time::Duration::from_secs(60));
    assert_eq!(config.scheduler.job_code, ATTRIBUTE_SYNC_JOB_CODE);
    assert_eq!(config.scheduler.delay_minutes, 5);
    assert_eq!(config.attribute_mapping.entity_type, "product");
    assert!(config.scopes.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let config: IndexSyncConfig = serde_json::from_str(
        r#"{
            "worker": { "batch_size": 50 },
            "diagnostics": { "verbose_scopes": [2] },
            "attribute_mapping": { "prefix": "ext_", "custom_types": { "size": "number" } }
        }"#,
    )
    .unwrap();

    assert_eq!(config.worker.batch_size, 50);
    assert_eq!(config.worker.call_timeout_secs, 60);
    assert!(config.diagnostics.is_verbose(2));
    assert!(!config.diagnostics.is_verbose(1));
    assert_eq!(config.attribute_mapping.prefix, "ext_");
    assert_eq!(config.attribute_mapping.entity_type, "product");
    assert_eq!(config.attribute_mapping.custom_types["size"], "number");
}

#[test]
fn criteria_comparisons_parse() {
    let config: IndexSyncConfig = serde_json::from_str(
        r#"{
            "requires_update": [
                { "target_type": "product", "identifier": "price", "comparison": "numeric", "tolerance": 0.01 },
                { "target_type": "product", "identifier": "category_ids", "comparison": "set" },
                { "target_type": "product", "identifier": "status", "comparison": "exact" }
            ]
        }"#,
    )
    .unwrap();

    let comparisons: Vec<_> = config
        .requires_update
        .iter()
        .map(|c| c.comparison.clone())
        .collect();
    assert_eq!(
        comparisons,
        vec![
            CriteriaComparison::Numeric { tolerance: 0.01 },
            CriteriaComparison::Set,
            CriteriaComparison::Exact,
        ]
    );
}

#[test]
fn unknown_comparison_is_rejected() {
    let parsed = serde_json::from_str::<IndexSyncConfig>(
        r#"{ "requires_update": [ { "target_type": "product", "identifier": "x", "comparison": "fuzzy" } ] }"#,
    );
    assert!(parsed.is_err());
}

fn scope_config(id: u32, api_key: &str) -> ScopeConfig {
    ScopeConfig {
        id,
        code: format!("scope{id}"),
        js_api_key: api_key.to_string(),
        rest_auth_key: "ABCDEFGHIJ1234567890".to_string(),
    }
}

#[test]
fn shared_api_key_is_invalid() {
    let config = IndexSyncConfig {
        scopes: vec![scope_config(1, "js-1001"), scope_config(2, "js-1001")],
        ..IndexSyncConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(matches!(err, IndexingError::Config(_)));
    assert!(err.is_configuration_error());
}

#[test]
fn zero_batch_size_is_invalid() {
    let mut config = IndexSyncConfig::default();
    config.worker.batch_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn from_file_loads_and_validates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "scopes": [ {{ "id": 1, "code": "default", "js_api_key": "js-1001", "rest_auth_key": "ABCDEFGHIJ1234567890" }} ] }}"#
    )
    .unwrap();

    let config = IndexSyncConfig::from_file(file.path()).unwrap();
    assert_eq!(config.scopes.len(), 1);
    assert_eq!(config.scopes[0].code, "default");
}

#[test]
fn from_file_reports_missing_file_and_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let missing = IndexSyncConfig::from_file(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, IndexingError::Io(_)));

    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    let bad = IndexSyncConfig::from_file(&path).unwrap_err();
    assert!(matches!(bad, IndexingError::Serialization(_)));
}

// ── Scope registry ──────────────────────────────────────────────

#[test]
fn resolves_scope_and_credentials() {
    let registry = registry();
    let binding = resolve_binding(&registry, API_KEY).unwrap();
    assert_eq!(binding.scope, default_scope());
    assert_eq!(binding.credentials, credentials());
    assert_eq!(binding.api_key(), API_KEY);
}

#[test]
fn unknown_key_and_missing_credentials_are_distinct_errors() {
    let mut registry = registry();
    registry.bind_api_key("js-3003", Scope::new(3, "de"));

    assert!(matches!(
        resolve_binding(&registry, "js-9999"),
        Err(IndexingError::ScopeNotFound { .. })
    ));
    assert!(matches!(
        resolve_binding(&registry, "js-3003"),
        Err(IndexingError::CredentialsNotFound { .. })
    ));
}

#[test]
fn bindings_are_sorted_and_skip_unbound_keys() {
    let mut registry = StaticScopeRegistry::new();
    registry
        .register(Scope::new(2, "fr"), AccountCredentials::new("js-2002", "K2"))
        .register(Scope::new(1, "default"), AccountCredentials::new("js-1001", "K1"))
        .bind_api_key("js-3003", Scope::new(3, "de"));

    let ids: Vec<u32> = registry.bindings().iter().map(|b| b.scope.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn re_registering_a_scope_replaces_its_key() {
    let mut registry = registry();
    registry.register(default_scope(), AccountCredentials::new("js-1111", "K"));

    assert!(registry.scope_for_api_key(API_KEY).is_none());
    assert_eq!(registry.bindings().len(), 1);
    assert_eq!(registry.bindings()[0].api_key(), "js-1111");
}

#[test]
fn registry_from_config() {
    let registry = StaticScopeRegistry::from_config(&[scope_config(1, "js-1001"), scope_config(2, "js-2002")]);
    assert_eq!(registry.bindings().len(), 2);
    assert_eq!(registry.scope_for_api_key("js-2002").unwrap().code, "scope2");
}
