//! Tag-aware blob cache.

use crate::error::{StoreError, StoreResult};
use crate::{format_timestamp, lock_conn, parse_timestamp, BUSY_TIMEOUT};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Source of the current time, injectable for TTL tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Key to blob storage with TTL and tag-based bulk invalidation.
///
/// A tag may be administratively disabled. While any of an entry's tags is
/// disabled, reads miss and writes are dropped.
pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> StoreResult<Option<String>>;

    fn save(&self, key: &str, data: &str, tags: &[&str], ttl: Duration) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Removes every entry carrying `tag`.
    fn clean_tag(&self, tag: &str) -> StoreResult<()>;

    fn is_enabled(&self, tag: &str) -> bool;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: String,
    tags: BTreeSet<String>,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    disabled_tags: HashSet<String>,
}

impl CacheState {
    fn any_disabled<'a>(&self, mut tags: impl Iterator<Item = &'a str>) -> bool {
        tags.any(|tag| self.disabled_tags.contains(tag))
    }
}

/// In-process [`CacheStore`].
pub struct MemoryCacheStore {
    state: RwLock<CacheState>,
    clock: Clock,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            clock,
        }
    }

    pub fn disable_tag(&self, tag: &str) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        state.disabled_tags.insert(tag.to_string());
        Ok(())
    }

    pub fn enable_tag(&self, tag: &str) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        state.disabled_tags.remove(tag);
        Ok(())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        let now = (self.clock)();
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(entry) = state.entries.get(key) else {
            return Ok(None);
        };
        if entry.expires_at <= now {
            debug!(key, "cache entry expired");
            return Ok(None);
        }
        if state.any_disabled(entry.tags.iter().map(String::as_str)) {
            return Ok(None);
        }
        Ok(Some(entry.data.clone()))
    }

    fn save(&self, key: &str, data: &str, tags: &[&str], ttl: Duration) -> StoreResult<()> {
        let now = (self.clock)();
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.any_disabled(tags.iter().copied()) {
            return Ok(());
        }
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                data: data.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        state.entries.remove(key);
        Ok(())
    }

    fn clean_tag(&self, tag: &str) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        state.entries.retain(|_, entry| !entry.tags.contains(tag));
        Ok(())
    }

    fn is_enabled(&self, tag: &str) -> bool {
        self.state
            .read()
            .map(|s| !s.disabled_tags.contains(tag))
            .unwrap_or(false)
    }
}

/// SQLite-backed [`CacheStore`], shared by every process using the same file.
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
    clock: Clock,
}

impl SqliteCacheStore {
    /// Opens (or creates) a cache store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?, Arc::new(Utc::now))
    }

    /// Opens an in-memory cache store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, Arc::new(Utc::now))
    }

    /// Replaces the clock used for expiry.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(conn: Connection, clock: Clock) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_tags (
                key TEXT NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (key, tag)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_tags_tag ON cache_tags (tag);

            CREATE TABLE IF NOT EXISTS cache_disabled_tags (
                tag TEXT PRIMARY KEY
            );
            ",
        )?;
        Ok(())
    }

    pub fn disable_tag(&self, tag: &str) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO cache_disabled_tags (tag) VALUES (?1)",
            params![tag],
        )?;
        Ok(())
    }

    pub fn enable_tag(&self, tag: &str) -> StoreResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute("DELETE FROM cache_disabled_tags WHERE tag = ?1", params![tag])?;
        Ok(())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> StoreResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn tag_disabled(conn: &Connection, tag: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cache_disabled_tags WHERE tag = ?1)",
            params![tag],
            |row| row.get(0),
        )
    }
}

impl CacheStore for SqliteCacheStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        let now = (self.clock)();
        let conn = lock_conn(&self.conn)?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT data, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((data, expires_at)) = row else {
            return Ok(None);
        };
        if parse_timestamp(&expires_at)? <= now {
            debug!(key, "cache entry expired");
            return Ok(None);
        }
        let disabled: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM cache_tags t JOIN cache_disabled_tags d ON t.tag = d.tag
                WHERE t.key = ?1
            )",
            params![key],
            |row| row.get(0),
        )?;
        if disabled {
            return Ok(None);
        }
        Ok(Some(data))
    }

    fn save(&self, key: &str, data: &str, tags: &[&str], ttl: Duration) -> StoreResult<()> {
        let now = (self.clock)();
        let mut conn = lock_conn(&self.conn)?;
        for tag in tags {
            if Self::tag_disabled(&conn, tag)? {
                return Ok(());
            }
        }

        let tx = conn.transaction()?;
        let now_ts = format_timestamp(now);
        tx.execute(
            "DELETE FROM cache_tags WHERE key IN (SELECT key FROM cache_entries WHERE expires_at <= ?1)",
            params![now_ts],
        )?;
        tx.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now_ts])?;
        tx.execute("DELETE FROM cache_tags WHERE key = ?1", params![key])?;
        tx.execute(
            "INSERT OR REPLACE INTO cache_entries (key, data, expires_at) VALUES (?1, ?2, ?3)",
            params![key, data, format_timestamp(now + ttl)],
        )?;
        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO cache_tags (key, tag) VALUES (?1, ?2)",
                params![key, tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        tx.execute("DELETE FROM cache_tags WHERE key = ?1", params![key])?;
        tx.commit()?;
        Ok(())
    }

    fn clean_tag(&self, tag: &str) -> StoreResult<()> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM cache_entries WHERE key IN (SELECT key FROM cache_tags WHERE tag = ?1)",
            params![tag],
        )?;
        tx.execute(
            "DELETE FROM cache_tags WHERE key NOT IN (SELECT key FROM cache_entries)",
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn is_enabled(&self, tag: &str) -> bool {
        let disabled = lock_conn(&self.conn)
            .and_then(|conn| Self::tag_disabled(&conn, tag).map_err(StoreError::from));
        match disabled {
            Ok(disabled) => !disabled,
            Err(e) => {
                warn!(tag, error = %e, "cannot read cache tag state; treating as disabled");
                false
            }
        }
    }
}
