//! SQLite-backed catalog cache.
//!
//! Stored at `$XDG_CACHE_HOME/tunevfs/catalogs.db` unless configured
//! otherwise. Objects are JSON payloads keyed by `(category, id)`; scopes
//! group object ids in remote order; lifetimes live in `timestamps`.
//!
//! All writes happen inside [`CacheStore::run_in_transaction`]. File stores
//! run in WAL mode and read through a second, read-only connection, so reads
//! never wait for a refresh transaction to commit.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::lifetime::Lifetime;
use crate::error::StoreError;

/// Schema SQL embedded from schema/cache.sql.
const SCHEMA_SQL: &str = include_str!("../../../../schema/cache.sql");

pub type StoreResult<T> = Result<T, StoreError>;

pub struct CacheStore {
    writer: Mutex<Connection>,
    /// `None` for in-memory stores, which read through the writer.
    reader: Option<Mutex<Connection>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish()
    }
}

impl CacheStore {
    /// Open or create a cache database at the given path.
    ///
    /// Creates parent directories and initializes schema if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        writer.execute_batch(SCHEMA_SQL)?;

        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!(path = %path.display(), journal = %mode, "opened cache store");
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
        })
    }

    /// Create an in-memory store (for testing or throwaway sessions).
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    fn writer(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| StoreError::Poisoned)
    }

    fn reader(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        match &self.reader {
            Some(reader) => reader.lock().map_err(|_| StoreError::Poisoned),
            None => self.writer(),
        }
    }

    // ================================================================
    // Lifetimes
    // ================================================================

    pub fn lifetime(&self, key: &str, ttl: TimeDelta) -> StoreResult<Lifetime> {
        let conn = self.reader()?;
        let stamp: Option<i64> = conn
            .query_row(
                "SELECT stamp FROM timestamps WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(Lifetime::new(
            key,
            ttl,
            stamp.and_then(DateTime::from_timestamp_millis),
        ))
    }

    // ================================================================
    // Transactions
    // ================================================================

    /// Run `f` in one write transaction. Any error rolls everything back.
    pub fn run_in_transaction<T>(
        &self,
        f: impl FnOnce(&CacheTx<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        let out = f(&CacheTx { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    // ================================================================
    // Reads
    // ================================================================

    /// Objects grouped under `scope`, in the order they were added.
    pub fn query_scope<T: DeserializeOwned>(&self, category: &str, scope: &str) -> StoreResult<Vec<T>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare_cached(
            "SELECT o.payload FROM groupings g
             JOIN objects o ON o.category = g.category AND o.id = g.id
             WHERE g.category = ?1 AND g.scope = ?2
             ORDER BY g.position",
        )?;
        let payloads = stmt
            .query_map(params![category, scope], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(payloads)
    }

    /// One object by id, following aliases.
    pub fn query_object<T: DeserializeOwned>(&self, category: &str, id: &str) -> StoreResult<Option<T>> {
        let conn = self.reader()?;
        let canonical = canonical_id(&conn, category, id)?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM objects WHERE category = ?1 AND id = ?2",
                params![category, canonical],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(|p| decode(&p)).transpose()
    }

    pub fn query_random_object<T: DeserializeOwned>(&self, category: &str) -> StoreResult<Option<T>> {
        let conn = self.reader()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM objects WHERE category = ?1 ORDER BY RANDOM() LIMIT 1",
                params![category],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(|p| decode(&p)).transpose()
    }

    /// Objects whose title contains `needle`, case-insensitively for ASCII.
    pub fn find_objects<T: DeserializeOwned>(&self, category: &str, needle: &str) -> StoreResult<Vec<T>> {
        let conn = self.reader()?;
        let pattern = format!("%{}%", escape_like(needle));
        let mut stmt = conn.prepare_cached(
            "SELECT payload FROM objects
             WHERE category = ?1 AND title LIKE ?2 ESCAPE '\\'
             ORDER BY title",
        )?;
        let payloads = stmt
            .query_map(params![category, pattern], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(payloads)
    }

    pub fn resolve_alias(&self, category: &str, id: &str) -> StoreResult<String> {
        let conn = self.reader()?;
        canonical_id(&conn, category, id)
    }
}

/// Write access, only available inside [`CacheStore::run_in_transaction`].
pub struct CacheTx<'a> {
    conn: &'a Connection,
}

impl CacheTx<'_> {
    pub fn add_object<T: Serialize>(&self, category: &str, id: &str, title: &str, value: &T) -> StoreResult<()> {
        let payload = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO objects (category, id, title, payload) VALUES (?1, ?2, ?3, ?4)",
            params![category, id, title, payload],
        )?;
        Ok(())
    }

    pub fn add_to_scope(&self, category: &str, scope: &str, id: &str, position: usize) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO groupings (category, scope, id, position) VALUES (?1, ?2, ?3, ?4)",
            params![category, scope, id, position as i64],
        )?;
        Ok(())
    }

    /// Forget scope membership. The objects themselves stay.
    pub fn cleanup_scope(&self, category: &str, scope: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM groupings WHERE category = ?1 AND scope = ?2",
            params![category, scope],
        )?;
        Ok(())
    }

    pub fn cleanup_object(&self, category: &str, id: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM objects WHERE category = ?1 AND id = ?2",
            params![category, id],
        )?;
        Ok(())
    }

    /// Point every scope membership of `alias` at `canonical`.
    pub fn rekey_memberships(&self, category: &str, alias: &str, canonical: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE OR REPLACE groupings SET id = ?3 WHERE category = ?1 AND id = ?2",
            params![category, alias, canonical],
        )?;
        Ok(())
    }

    pub fn add_alias(&self, category: &str, alias: &str, canonical: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO aliases (category, alias, canonical) VALUES (?1, ?2, ?3)",
            params![category, alias, canonical],
        )?;
        Ok(())
    }

    /// Mark the lifetime fresh as of now.
    pub fn update_lifetime(&self, lifetime: &mut Lifetime) -> StoreResult<()> {
        self.update_lifetime_at(lifetime, Utc::now())
    }

    pub fn update_lifetime_at(&self, lifetime: &mut Lifetime, at: DateTime<Utc>) -> StoreResult<()> {
        self.touch_at(lifetime.key(), at)?;
        lifetime.set_refreshed(at);
        Ok(())
    }

    /// Mark `key` fresh as of now without holding its [`Lifetime`].
    pub fn touch(&self, key: &str) -> StoreResult<()> {
        self.touch_at(key, Utc::now())
    }

    fn touch_at(&self, key: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO timestamps (key, stamp) VALUES (?1, ?2)",
            params![key, at.timestamp_millis()],
        )?;
        Ok(())
    }
}

fn canonical_id(conn: &Connection, category: &str, id: &str) -> StoreResult<String> {
    let canonical: Option<String> = conn
        .query_row(
            "SELECT canonical FROM aliases WHERE category = ?1 AND alias = ?2",
            params![category, id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(canonical.unwrap_or_else(|| id.to_string()))
}

fn decode<T: DeserializeOwned>(payload: &str) -> StoreResult<T> {
    Ok(serde_json::from_str(payload)?)
}

fn decode_all<T: DeserializeOwned>(payloads: Vec<String>) -> StoreResult<Vec<T>> {
    payloads.iter().map(|p| decode(p)).collect()
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
