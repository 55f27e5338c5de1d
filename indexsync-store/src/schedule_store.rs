//! Cron schedule rows.
//!
//! A job may have any number of historical rows but at most one `pending`
//! row; a partial unique index enforces this so that concurrent schedulers
//! cannot queue the same job twice.

use crate::error::{is_constraint_violation, ScheduleError, StoreError, StoreResult};
use crate::{format_timestamp, lock_conn, parse_optional_timestamp, parse_timestamp, BUSY_TIMEOUT};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Id of a schedule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub i64);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a schedule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Running,
    Success,
    Error,
    Missed,
}

impl ScheduleStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Running => "running",
            ScheduleStatus::Success => "success",
            ScheduleStatus::Error => "error",
            ScheduleStatus::Missed => "missed",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "running" => Ok(ScheduleStatus::Running),
            "success" => Ok(ScheduleStatus::Success),
            "error" => Ok(ScheduleStatus::Error),
            "missed" => Ok(ScheduleStatus::Missed),
            other => Err(StoreError::InvalidData(format!("unknown schedule status {other:?}"))),
        }
    }
}

/// One cron schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleId,
    pub job_code: String,
    pub status: ScheduleStatus,
    pub messages: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Storage for cron schedule rows.
pub trait ScheduleStore: Send + Sync {
    /// Queues a pending run of `job_code`. Returns
    /// [`ScheduleError::Duplicate`] if one is already pending.
    fn insert_pending(
        &self,
        job_code: &str,
        created_at: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<ScheduleId, ScheduleError>;

    /// All rows for a job, oldest first.
    fn find_by_job(&self, job_code: &str) -> StoreResult<Vec<ScheduleEntry>>;

    /// Moves a row to a new status.
    fn mark_status(
        &self,
        id: ScheduleId,
        status: ScheduleStatus,
        at: DateTime<Utc>,
        messages: Option<&str>,
    ) -> StoreResult<()>;
}

/// SQLite-backed [`ScheduleStore`].
#[derive(Clone)]
pub struct SqliteScheduleStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScheduleStore {
    /// Opens (or creates) a schedule store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory schedule store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cron_schedule (
                schedule_id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_code TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                messages TEXT,
                created_at TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                finished_at TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_cron_schedule_pending
                ON cron_schedule (job_code) WHERE status = 'pending';
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn insert_pending(
        &self,
        job_code: &str,
        created_at: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<ScheduleId, ScheduleError> {
        let conn = lock_conn(&self.conn)?;
        let inserted = conn.execute(
            "INSERT INTO cron_schedule (job_code, status, created_at, scheduled_at)
             VALUES (?1, 'pending', ?2, ?3)",
            params![job_code, format_timestamp(created_at), format_timestamp(scheduled_at)],
        );
        match inserted {
            Ok(_) => Ok(ScheduleId(conn.last_insert_rowid())),
            Err(e) if is_constraint_violation(&e) => {
                Err(ScheduleError::Duplicate(job_code.to_string()))
            }
            Err(e) => Err(StoreError::from(e).into()),
        }
    }

    fn find_by_job(&self, job_code: &str) -> StoreResult<Vec<ScheduleEntry>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT schedule_id, job_code, status, messages, created_at, scheduled_at, finished_at
             FROM cron_schedule WHERE job_code = ?1 ORDER BY schedule_id",
        )?;
        let rows = stmt.query_map(params![job_code], |row| {
            let id: i64 = row.get(0)?;
            let job_code: String = row.get(1)?;
            let status: String = row.get(2)?;
            let messages: Option<String> = row.get(3)?;
            let created_at: String = row.get(4)?;
            let scheduled_at: String = row.get(5)?;
            let finished_at: Option<String> = row.get(6)?;
            Ok((id, job_code, status, messages, created_at, scheduled_at, finished_at))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, job_code, status, messages, created_at, scheduled_at, finished_at) = row?;
            entries.push(ScheduleEntry {
                id: ScheduleId(id),
                job_code,
                status: status.parse()?,
                messages,
                created_at: parse_timestamp(&created_at)?,
                scheduled_at: parse_timestamp(&scheduled_at)?,
                finished_at: parse_optional_timestamp(finished_at)?,
            });
        }
        Ok(entries)
    }

    fn mark_status(
        &self,
        id: ScheduleId,
        status: ScheduleStatus,
        at: DateTime<Utc>,
        messages: Option<&str>,
    ) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        let finished_at = match status {
            ScheduleStatus::Pending | ScheduleStatus::Running => None,
            _ => Some(format_timestamp(at)),
        };
        let updated = conn.execute(
            "UPDATE cron_schedule SET status = ?2, finished_at = ?3, messages = ?4
             WHERE schedule_id = ?1",
            params![id.0, status.as_str(), finished_at, messages],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("schedule {id}")));
        }
        Ok(())
    }
}
