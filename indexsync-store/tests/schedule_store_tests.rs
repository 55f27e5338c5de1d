use chrono::{Duration, Utc};
use indexsync_store::{ScheduleError, ScheduleStatus, ScheduleStore, SqliteScheduleStore};

#[test]
fn insert_pending_creates_row() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let now = Utc::now();

    store.insert_pending("indexsync_sync_attributes", now, now + Duration::minutes(5)).unwrap();

    let rows = store.find_by_job("indexsync_sync_attributes").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ScheduleStatus::Pending);
    assert_eq!(rows[0].scheduled_at - rows[0].created_at, Duration::minutes(5));
}

#[test]
fn second_pending_row_is_duplicate() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let now = Utc::now();
    store.insert_pending("job", now, now).unwrap();

    let err = store.insert_pending("job", now, now).unwrap_err();
    assert!(matches!(err, ScheduleError::Duplicate(ref code) if code == "job"));
    assert_eq!(store.find_by_job("job").unwrap().len(), 1);
}

#[test]
fn other_jobs_are_independent() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let now = Utc::now();
    store.insert_pending("a", now, now).unwrap();
    store.insert_pending("b", now, now).unwrap();
    assert_eq!(store.find_by_job("b").unwrap().len(), 1);
}

#[test]
fn finished_row_allows_new_pending_row() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let now = Utc::now();
    let id = store.insert_pending("job", now, now).unwrap();

    store.mark_status(id, ScheduleStatus::Success, now, Some("done")).unwrap();
    store.insert_pending("job", now, now + Duration::minutes(5)).unwrap();

    let rows = store.find_by_job("job").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, ScheduleStatus::Success);
    assert_eq!(rows[0].messages.as_deref(), Some("done"));
    assert!(rows[0].finished_at.is_some());
    assert_eq!(rows[1].status, ScheduleStatus::Pending);
}

#[test]
fn running_row_does_not_block_new_pending_row() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let now = Utc::now();
    let id = store.insert_pending("job", now, now).unwrap();
    store.mark_status(id, ScheduleStatus::Running, now, None).unwrap();

    assert!(store.insert_pending("job", now, now).is_ok());
    assert!(store.find_by_job("job").unwrap()[0].finished_at.is_none());
}
