use chrono::{Duration, TimeZone, Utc};
use indexsync_engine::config::ATTRIBUTE_SYNC_JOB_CODE;
use indexsync_engine::{CronScheduler, SchedulerConfig};
use indexsync_store::{ScheduleStatus, ScheduleStore, SqliteScheduleStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn scheduler() -> (Arc<SqliteScheduleStore>, CronScheduler) {
    let store = Arc::new(SqliteScheduleStore::open_in_memory().unwrap());
    let scheduler = CronScheduler::new(store.clone(), &SchedulerConfig::default());
    (store, scheduler)
}

#[test]
fn queues_one_pending_row_five_minutes_out() {
    let (store, scheduler) = scheduler();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    scheduler.execute_at(now);

    let rows = store.find_by_job(ATTRIBUTE_SYNC_JOB_CODE).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ScheduleStatus::Pending);
    assert_eq!(rows[0].created_at, now);
    assert_eq!(rows[0].scheduled_at - rows[0].created_at, Duration::minutes(5));
}

#[test]
fn repeated_calls_keep_a_single_pending_row() {
    let (store, scheduler) = scheduler();
    let now = Utc::now();

    scheduler.execute_at(now);
    scheduler.execute_at(now + Duration::seconds(30));
    scheduler.execute();

    assert_eq!(store.find_by_job(ATTRIBUTE_SYNC_JOB_CODE).unwrap().len(), 1);
}

#[test]
fn finished_run_allows_a_new_one() {
    let (store, scheduler) = scheduler();
    let now = Utc::now();
    scheduler.execute_at(now);
    let first = store.find_by_job(ATTRIBUTE_SYNC_JOB_CODE).unwrap()[0].id;

    store
        .mark_status(first, ScheduleStatus::Running, now + Duration::minutes(5), None)
        .unwrap();
    scheduler.execute_at(now + Duration::minutes(6));
    store
        .mark_status(first, ScheduleStatus::Success, now + Duration::minutes(7), None)
        .unwrap();
    scheduler.execute_at(now + Duration::minutes(8));

    let rows = store.find_by_job(ATTRIBUTE_SYNC_JOB_CODE).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, ScheduleStatus::Success);
    assert_eq!(rows[1].status, ScheduleStatus::Pending);
}

#[test]
fn custom_job_code_and_delay() {
    let store = Arc::new(SqliteScheduleStore::open_in_memory().unwrap());
    let scheduler = CronScheduler::new(
        store.clone(),
        &SchedulerConfig {
            job_code: "reindex".to_string(),
            delay_minutes: 15,
        },
    );
    assert_eq!(scheduler.job_code(), "reindex");

    scheduler.execute();

    let rows = store.find_by_job("reindex").unwrap();
    assert_eq!(rows[0].scheduled_at - rows[0].created_at, Duration::minutes(15));
    assert!(store.find_by_job(ATTRIBUTE_SYNC_JOB_CODE).unwrap().is_empty());
}
