//! Key-value persistence contract and implementations.
//!
//! # Responsibility
//! - Provide the `get`/`set` contract the cart store persists through.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Keys are non-empty after trimming.
//! - `set` replaces the whole value stored under a key.
//! - `get` on a never-written key returns `Ok(None)`.

use crate::db::{open_db, DbError};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Mutex;

pub type KvResult<T> = Result<T, KvError>;

/// Error for key-value reads and writes.
#[derive(Debug)]
pub enum KvError {
    Db(DbError),
    InvalidKey(String),
    Poisoned,
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
            Self::Poisoned => write!(f, "storage lock poisoned by a panicking writer"),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidKey(_) | Self::Poisoned => None,
        }
    }
}

impl From<DbError> for KvError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable string-to-string storage shared by core stores.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> KvResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> KvResult<()>;
}

/// SQLite-backed key-value store over the `kv_store` table.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - Returns `KvError::Db` when the `kv_store` table is missing, which
    ///   means the connection did not come from `open_db`.
    pub fn try_new(conn: Connection) -> KvResult<Self> {
        conn.query_row("SELECT COUNT(*) FROM kv_store;", [], |row| row.get::<_, i64>(0))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (or creates) a database file and wraps it.
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        let conn = open_db(path)?;
        Self::try_new(conn)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let key = normalize_key(key)?;
        let conn = self.conn.lock().map_err(|_| KvError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let key = normalize_key(key)?;
        let conn = self.conn.lock().map_err(|_| KvError::Poisoned)?;
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Process-local key-value store; contents vanish on drop.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let key = normalize_key(key)?;
        let entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let key = normalize_key(key)?;
        let mut entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn normalize_key(key: &str) -> KvResult<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(KvError::InvalidKey(key.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::{normalize_key, KeyValueStore, KvError, MemoryKeyValueStore};

    #[test]
    fn normalize_key_trims_and_rejects_blank() {
        assert_eq!(normalize_key("  @k  ").unwrap(), "@k");
        assert!(matches!(normalize_key("   "), Err(KvError::InvalidKey(_))));
    }

    #[test]
    fn memory_store_overwrites_value() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
    }
}
