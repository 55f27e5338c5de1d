mod common;

use common::{credentials, ScriptedApi, Reply, API_KEY};
use indexsync_engine::events::{
    ATTRIBUTE_DELETED_EVENT, ATTRIBUTE_UPDATED_EVENT, FINGERPRINT_KEY, PAYLOAD_API_KEY,
    PAYLOAD_ATTRIBUTE_NAME, PAYLOAD_FINGERPRINT, PAYLOAD_TARGET_TYPE,
};
use indexsync_engine::mapping::fingerprint;
use indexsync_engine::{
    AttributeMapper, AttributeRecordUpdater, AttributeSyncAction, BroadcastEventBus,
    IndexingError, IndexingResult, SyncEvent, SyncEventHandler,
};
use indexsync_remote::{ApiError, HttpIndexingApi, RemoteConfig};
use indexsync_store::{IndexingRecordStore, SqliteRecordStore};
use indexsync_types::{
    AccountCredentials, Action, NewIndexingRecord, RecordKey, RemoteAttribute, RemoteDataType,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<SyncEvent>>,
}

impl Recorder {
    fn names(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.name.clone()).collect()
    }
}

impl SyncEventHandler for Recorder {
    fn handle(&self, event: &SyncEvent) -> IndexingResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct Failing;

impl SyncEventHandler for Failing {
    fn handle(&self, _event: &SyncEvent) -> IndexingResult<()> {
        Err(IndexingError::Config("handler down".to_string()))
    }
}

fn http_api(server: &MockServer) -> Arc<HttpIndexingApi> {
    Arc::new(
        HttpIndexingApi::new(RemoteConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        })
        .unwrap(),
    )
}

fn color() -> RemoteAttribute {
    RemoteAttribute::new("ext_color", RemoteDataType::Multivalue)
}

// ── Outcome normalization ───────────────────────────────────────

#[tokio::test]
async fn successful_update_emits_event() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/attributes/ext_color"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let action = AttributeSyncAction::update(http_api(&server)).with_handler(recorder.clone());
    let result = action.execute(&credentials(), &color(), "product").await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.code(), 200);
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, ATTRIBUTE_UPDATED_EVENT);
    assert_eq!(events[0].get(PAYLOAD_ATTRIBUTE_NAME), Some("ext_color"));
    assert_eq!(events[0].get(PAYLOAD_API_KEY), Some(API_KEY));
    assert_eq!(events[0].get(PAYLOAD_TARGET_TYPE), Some("product"));
    assert_eq!(events[0].get(PAYLOAD_FINGERPRINT), Some(fingerprint(&color()).as_str()));
}

#[tokio::test]
async fn successful_delete_emits_delete_event() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/attributes/ext_color"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let action = AttributeSyncAction::delete(http_api(&server)).with_handler(recorder.clone());
    let result = action.execute(&credentials(), &color(), "product").await.unwrap();

    assert!(result.is_success());
    assert_eq!(recorder.names(), vec![ATTRIBUTE_DELETED_EVENT.to_string()]);
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events[0].get(PAYLOAD_FINGERPRINT), None);
}

#[tokio::test]
async fn remote_rejection_is_a_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "message": "Bad Request",
            "errors": ["datatype cannot be changed"]
        })))
        .mount(&server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let action = AttributeSyncAction::update(http_api(&server)).with_handler(recorder.clone());
    let result = action.execute(&credentials(), &color(), "product").await.unwrap();

    assert!(!result.is_success());
    assert_eq!(result.code(), 400);
    assert_eq!(result.messages(), ["Bad Request", "datatype cannot be changed"]);
    assert!(recorder.names().is_empty());
}

#[tokio::test]
async fn transport_failure_is_a_500_result() {
    let api = Arc::new(
        HttpIndexingApi::new(RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
        })
        .unwrap(),
    );
    let result = AttributeSyncAction::update(api)
        .execute(&credentials(), &color(), "product")
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.code(), 500);
    assert_eq!(result.messages().len(), 1);
}

#[tokio::test]
async fn malformed_credentials_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let bad = AccountCredentials::new("NOT-A-KEY", "ABCDEFGHIJ1234567890");
    let err = AttributeSyncAction::update(http_api(&server))
        .execute(&bad, &color(), "product")
        .await
        .unwrap_err();

    assert!(matches!(err, IndexingError::InvalidAccountCredentials(_)));
    assert!(err.is_fatal());
    assert!(!err.is_configuration_error());
}

#[tokio::test]
async fn scripted_credential_rejection_is_fatal() {
    let api = ScriptedApi::new();
    api.reply(Reply::Error(ApiError::InvalidCredentials("revoked".to_string())));
    let err = AttributeSyncAction::delete(api)
        .execute(&credentials(), &color(), "product")
        .await
        .unwrap_err();
    assert!(matches!(err, IndexingError::InvalidAccountCredentials(msg) if msg == "revoked"));
}

#[tokio::test]
async fn handler_failure_does_not_fail_the_push() {
    let api = ScriptedApi::new();
    let recorder = Arc::new(Recorder::default());
    let action = AttributeSyncAction::update(api)
        .with_handler(Arc::new(Failing))
        .with_handler(recorder.clone());

    let result = action.execute(&credentials(), &color(), "product").await.unwrap();
    assert!(result.is_success());
    assert_eq!(recorder.names().len(), 1);
}

// ── Event bus ───────────────────────────────────────────────────

#[tokio::test]
async fn broadcast_bus_forwards_events() {
    let bus = Arc::new(BroadcastEventBus::default());
    let mut rx = bus.subscribe();
    let action = AttributeSyncAction::update(ScriptedApi::new()).with_handler(bus.clone());

    action.execute(&credentials(), &color(), "product").await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.name, ATTRIBUTE_UPDATED_EVENT);
    assert_eq!(event.get(PAYLOAD_ATTRIBUTE_NAME), Some("ext_color"));
}

#[test]
fn publish_without_subscribers_is_silent() {
    BroadcastEventBus::new(4).publish(SyncEvent::new("nobody.listening"));
}

// ── Record updater ──────────────────────────────────────────────

fn updater_fixture(next_action: Action) -> (Arc<SqliteRecordStore>, AttributeRecordUpdater, RecordKey) {
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let key = RecordKey::attribute("product", "color", API_KEY);
    store
        .insert(&NewIndexingRecord::new(key.clone(), true, next_action))
        .unwrap();
    let names = Arc::new(AttributeMapper::new("product", "ext_", BTreeMap::new()));
    let updater = AttributeRecordUpdater::new(store.clone(), names);
    (store, updater, key)
}

#[test]
fn updater_marks_added_attribute_synced() {
    let (store, updater, key) = updater_fixture(Action::Add);
    let event = SyncEvent::attribute(ATTRIBUTE_UPDATED_EVENT, "ext_color", API_KEY, "product");
    updater.handle(&event).unwrap();

    let record = store.find(&key).unwrap().unwrap();
    assert_eq!(record.last_action, Action::Add);
    assert_eq!(record.next_action, Action::NoAction);
    assert!(record.last_action_timestamp.is_some());
    assert!(record.is_indexed());
    assert!(record.requires_update_orig_values.is_empty());
}

#[test]
fn updater_stores_pushed_fingerprint() {
    let (store, updater, key) = updater_fixture(Action::Update);
    let event = SyncEvent::attribute(ATTRIBUTE_UPDATED_EVENT, "ext_color", API_KEY, "product")
        .with(PAYLOAD_FINGERPRINT, "abc123");
    updater.handle(&event).unwrap();

    let record = store.find(&key).unwrap().unwrap();
    assert_eq!(record.last_action, Action::Update);
    assert_eq!(
        record.requires_update_orig_values.get(FINGERPRINT_KEY),
        Some(&serde_json::json!("abc123"))
    );
}

#[test]
fn updater_marks_deleted_attribute() {
    let (store, updater, key) = updater_fixture(Action::Delete);
    let event = SyncEvent::attribute(ATTRIBUTE_DELETED_EVENT, "ext_color", API_KEY, "product");
    updater.handle(&event).unwrap();

    let record = store.find(&key).unwrap().unwrap();
    assert_eq!(record.last_action, Action::Delete);
    assert_eq!(record.next_action, Action::NoAction);
    assert!(!record.is_indexed());
}

#[test]
fn updater_ignores_unrelated_events() {
    let (store, updater, key) = updater_fixture(Action::Add);
    updater.handle(&SyncEvent::new("something.else")).unwrap();
    updater
        .handle(&SyncEvent::attribute(ATTRIBUTE_UPDATED_EVENT, "ext_color", API_KEY, "category"))
        .unwrap();
    updater
        .handle(&SyncEvent::attribute(ATTRIBUTE_UPDATED_EVENT, "ext_unknown", API_KEY, "product"))
        .unwrap();

    assert_eq!(store.find(&key).unwrap().unwrap().next_action, Action::Add);
}
