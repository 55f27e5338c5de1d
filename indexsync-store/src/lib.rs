//! Storage layer for indexsync.
//!
//! Provides the persistence collaborators the indexing engine depends on:
//!
//! - [`IndexingRecordStore`]: CRUD plus the compare-and-swap claim over
//!   indexing records, with a SQLite implementation.
//! - [`ScheduleStore`]: cron schedule rows with a one-pending-row-per-job
//!   uniqueness guarantee, with a SQLite implementation.
//! - [`CacheStore`]: key to blob with TTL and tag-based bulk invalidation,
//!   with in-memory and SQLite implementations.
//!
//! All stores hand back fully typed domain values; parsing of stored strings
//! happens once, inside the adapter.

mod cache_store;
mod error;
mod record_store;
mod schedule_store;

pub use cache_store::{CacheStore, Clock, MemoryCacheStore, SqliteCacheStore};
pub use error::{ScheduleError, StoreError, StoreResult};
pub use record_store::{IndexingRecordStore, PendingQuery, SqliteRecordStore};
pub use schedule_store::{
    ScheduleEntry, ScheduleId, ScheduleStatus, ScheduleStore, SqliteScheduleStore,
};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a connection waits on another process's write lock.
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Formats a timestamp so that lexicographic order equals time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StoreError::LockPoisoned)
}
