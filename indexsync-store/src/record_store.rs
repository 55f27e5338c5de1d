//! Persistent storage for indexing records.
//!
//! Uses SQLite. Uniqueness of the natural key and the lock claim are both
//! enforced inside the database so that overlapping cron cycles in separate
//! processes cannot step on each other.

use crate::error::{is_constraint_violation, StoreError, StoreResult};
use crate::{format_timestamp, lock_conn, parse_optional_timestamp, BUSY_TIMEOUT};
use chrono::{DateTime, Utc};
use indexsync_types::{
    Action, IndexingRecord, NewIndexingRecord, RecordId, RecordKey, RecordKind,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Filter for records waiting on a remote call.
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub kind: RecordKind,
    pub target_type: String,
    pub api_key: String,
    /// `None` matches any pending action (anything but `NoAction`).
    pub next_action: Option<Action>,
    pub is_indexable: Option<bool>,
    pub limit: usize,
}

impl PendingQuery {
    pub fn new(kind: RecordKind, target_type: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            target_type: target_type.into(),
            api_key: api_key.into(),
            next_action: None,
            is_indexable: None,
            limit: 250,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.next_action = Some(action);
        self
    }

    pub fn with_indexable(mut self, is_indexable: bool) -> Self {
        self.is_indexable = Some(is_indexable);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// CRUD and claim operations over indexing records.
pub trait IndexingRecordStore: Send + Sync {
    /// Creates a record. Fails with [`StoreError::Duplicate`] when a record
    /// with the same key exists.
    fn insert(&self, record: &NewIndexingRecord) -> StoreResult<IndexingRecord>;

    /// Looks a record up by its natural key.
    fn find(&self, key: &RecordKey) -> StoreResult<Option<IndexingRecord>>;

    /// Loads a record by id.
    fn get(&self, id: RecordId) -> StoreResult<IndexingRecord>;

    /// All records of one kind and target type for an API key.
    fn find_all(
        &self,
        kind: RecordKind,
        target_type: &str,
        api_key: &str,
    ) -> StoreResult<Vec<IndexingRecord>>;

    /// Records with a pending action matching the query, oldest first.
    fn find_pending(&self, query: &PendingQuery) -> StoreResult<Vec<IndexingRecord>>;

    /// Persists the mutable state fields. The lock column is left untouched;
    /// use [`claim`](Self::claim) and [`release`](Self::release) for it.
    fn save(&self, record: &IndexingRecord) -> StoreResult<()>;

    /// Atomically takes the record's lock. Succeeds only when the record is
    /// unlocked or its lock was taken before `stale_before`.
    fn claim(
        &self,
        id: RecordId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Clears the record's lock.
    fn release(&self, id: RecordId) -> StoreResult<()>;
}

/// SQLite-backed [`IndexingRecordStore`].
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "id, kind, target_type, target_id, target_parent_id, api_key, \
     is_indexable, next_action, last_action, last_action_timestamp, lock_timestamp, \
     requires_update, requires_update_orig_values, current_values";

impl SqliteRecordStore {
    /// Opens (or creates) a record store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory record store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS indexing_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                target_parent_id TEXT,
                api_key TEXT NOT NULL,
                is_indexable INTEGER NOT NULL DEFAULT 1,
                next_action TEXT NOT NULL DEFAULT '',
                last_action TEXT NOT NULL DEFAULT '',
                last_action_timestamp TEXT,
                lock_timestamp TEXT,
                requires_update INTEGER NOT NULL DEFAULT 0,
                requires_update_orig_values TEXT NOT NULL DEFAULT '{}',
                current_values TEXT NOT NULL DEFAULT '{}'
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_indexing_records_key
                ON indexing_records (kind, target_type, target_id, IFNULL(target_parent_id, ''), api_key);

            CREATE INDEX IF NOT EXISTS idx_indexing_records_pending
                ON indexing_records (kind, target_type, api_key, next_action, is_indexable);
            ",
        )?;
        Ok(())
    }
}

/// Row as SQLite returns it, before conversion into domain types.
struct RawRecord {
    id: i64,
    kind: String,
    target_type: String,
    target_id: String,
    target_parent_id: Option<String>,
    api_key: String,
    is_indexable: bool,
    next_action: String,
    last_action: String,
    last_action_timestamp: Option<String>,
    lock_timestamp: Option<String>,
    requires_update: bool,
    requires_update_orig_values: String,
    current_values: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            target_type: row.get(2)?,
            target_id: row.get(3)?,
            target_parent_id: row.get(4)?,
            api_key: row.get(5)?,
            is_indexable: row.get(6)?,
            next_action: row.get(7)?,
            last_action: row.get(8)?,
            last_action_timestamp: row.get(9)?,
            lock_timestamp: row.get(10)?,
            requires_update: row.get(11)?,
            requires_update_orig_values: row.get(12)?,
            current_values: row.get(13)?,
        })
    }

    fn into_record(self) -> StoreResult<IndexingRecord> {
        let orig_values = parse_object(
            self.id,
            "requires_update_orig_values",
            &self.requires_update_orig_values,
        )?;
        let current_values = parse_object(self.id, "current_values", &self.current_values)?;

        Ok(IndexingRecord {
            id: RecordId::new(self.id),
            key: RecordKey {
                kind: RecordKind::from_str(&self.kind)?,
                target_type: self.target_type,
                target_id: self.target_id,
                target_parent_id: self.target_parent_id,
                api_key: self.api_key,
            },
            is_indexable: self.is_indexable,
            next_action: Action::from_str(&self.next_action)?,
            last_action: Action::from_str(&self.last_action)?,
            last_action_timestamp: parse_optional_timestamp(self.last_action_timestamp)?,
            lock_timestamp: parse_optional_timestamp(self.lock_timestamp)?,
            requires_update: self.requires_update,
            requires_update_orig_values: orig_values,
            current_values,
        })
    }
}

fn parse_object(id: i64, column: &str, raw: &str) -> StoreResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(StoreError::InvalidData(format!(
            "{column} of record {id} is not an object: {other}"
        ))),
    }
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRecord>>,
) -> StoreResult<Vec<IndexingRecord>> {
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

impl IndexingRecordStore for SqliteRecordStore {
    fn insert(&self, record: &NewIndexingRecord) -> StoreResult<IndexingRecord> {
        let conn = lock_conn(&self.conn)?;
        let orig_values = serde_json::to_string(&record.requires_update_orig_values)?;
        let current_values = serde_json::to_string(&record.current_values)?;
        let key = &record.key;

        let inserted = conn.execute(
            "INSERT INTO indexing_records
                (kind, target_type, target_id, target_parent_id, api_key,
                 is_indexable, next_action, last_action, requires_update,
                 requires_update_orig_values, current_values)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '', ?8, ?9, ?10)",
            params![
                key.kind.as_str(),
                key.target_type,
                key.target_id,
                key.target_parent_id,
                key.api_key,
                record.is_indexable,
                record.next_action.as_str(),
                record.requires_update,
                orig_values,
                current_values,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::Duplicate(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = RecordId::new(conn.last_insert_rowid());
        debug!(%id, key = %key, next_action = %record.next_action, "inserted indexing record");

        Ok(IndexingRecord {
            id,
            key: key.clone(),
            is_indexable: record.is_indexable,
            next_action: record.next_action,
            last_action: Action::NoAction,
            last_action_timestamp: None,
            lock_timestamp: None,
            requires_update: record.requires_update,
            requires_update_orig_values: record.requires_update_orig_values.clone(),
            current_values: record.current_values.clone(),
        })
    }

    fn find(&self, key: &RecordKey) -> StoreResult<Option<IndexingRecord>> {
        let conn = lock_conn(&self.conn)?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM indexing_records
                     WHERE kind = ?1 AND target_type = ?2 AND target_id = ?3
                       AND IFNULL(target_parent_id, '') = IFNULL(?4, '') AND api_key = ?5"
                ),
                params![
                    key.kind.as_str(),
                    key.target_type,
                    key.target_id,
                    key.target_parent_id,
                    key.api_key,
                ],
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn get(&self, id: RecordId) -> StoreResult<IndexingRecord> {
        let conn = lock_conn(&self.conn)?;
        let raw = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM indexing_records WHERE id = ?1"),
                params![id.get()],
                RawRecord::from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))?;
        raw.into_record()
    }

    fn find_all(
        &self,
        kind: RecordKind,
        target_type: &str,
        api_key: &str,
    ) -> StoreResult<Vec<IndexingRecord>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM indexing_records
             WHERE kind = ?1 AND target_type = ?2 AND api_key = ?3
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![kind.as_str(), target_type, api_key], RawRecord::from_row)?;
        collect_records(rows)
    }

    fn find_pending(&self, query: &PendingQuery) -> StoreResult<Vec<IndexingRecord>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM indexing_records
             WHERE kind = ?1 AND target_type = ?2 AND api_key = ?3
               AND next_action != ''
               AND (?4 IS NULL OR next_action = ?4)
               AND (?5 IS NULL OR is_indexable = ?5)
             ORDER BY id
             LIMIT ?6"
        ))?;
        let rows = stmt.query_map(
            params![
                query.kind.as_str(),
                query.target_type,
                query.api_key,
                query.next_action.map(|a| a.as_str()),
                query.is_indexable,
                query.limit as i64,
            ],
            RawRecord::from_row,
        )?;
        collect_records(rows)
    }

    fn save(&self, record: &IndexingRecord) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        let orig_values = serde_json::to_string(&record.requires_update_orig_values)?;
        let current_values = serde_json::to_string(&record.current_values)?;
        let updated = conn.execute(
            "UPDATE indexing_records
             SET is_indexable = ?2, next_action = ?3, last_action = ?4,
                 last_action_timestamp = ?5, requires_update = ?6,
                 requires_update_orig_values = ?7, current_values = ?8
             WHERE id = ?1",
            params![
                record.id.get(),
                record.is_indexable,
                record.next_action.as_str(),
                record.last_action.as_str(),
                record.last_action_timestamp.map(format_timestamp),
                record.requires_update,
                orig_values,
                current_values,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("record {}", record.id)));
        }
        Ok(())
    }

    fn claim(
        &self,
        id: RecordId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = lock_conn(&self.conn)?;
        let updated = conn.execute(
            "UPDATE indexing_records SET lock_timestamp = ?2
             WHERE id = ?1 AND (lock_timestamp IS NULL OR lock_timestamp < ?3)",
            params![id.get(), format_timestamp(now), format_timestamp(stale_before)],
        )?;
        Ok(updated == 1)
    }

    fn release(&self, id: RecordId) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "UPDATE indexing_records SET lock_timestamp = NULL WHERE id = ?1",
            params![id.get()],
        )?;
        Ok(())
    }
}
