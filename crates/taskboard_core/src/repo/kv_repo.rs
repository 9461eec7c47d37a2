//! Durable key-value store contracts and implementations.
//!
//! # Responsibility
//! - Provide get/set by key over opaque byte payloads.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every call is independently fallible; callers decide recovery.
//! - `set` fully replaces any previous value for the key.

use crate::db::migrations::ensure_migrated;
use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-level failure for reading, writing or decoding the state blob.
#[derive(Debug)]
pub enum StorageError {
    /// Medium could not be read.
    Read(String),
    /// Medium rejected the write.
    Write(String),
    /// Payload was read but could not be decoded.
    Corrupt(String),
    /// Underlying database bootstrap/schema failure.
    Db(DbError),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(message) => write!(f, "storage read failed: {message}"),
            Self::Write(message) => write!(f, "storage write failed: {message}"),
            Self::Corrupt(message) => write!(f, "stored payload is corrupt: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Read(_) | Self::Write(_) | Self::Corrupt(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Byte store addressed by string keys.
pub trait KvRepository {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;
}

impl<R: KvRepository + ?Sized> KvRepository for &R {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        (**self).set(key, value)
    }
}

/// In-process store. Clones share the same backing map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvRepository {
    entries: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl MemoryKvRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KvRepository for MemoryKvRepository {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// SQLite-backed store over the `kv_entries` table.
pub struct SqliteKvRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKvRepository<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `StorageError::Db` when the connection schema is not at the latest
    ///   migration version.
    pub fn try_new(conn: &'conn Connection) -> StorageResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl KvRepository for SqliteKvRepository<'_> {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(|err| StorageError::Read(err.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                params![key, value],
            )
            .map(|_| ())
            .map_err(|err| StorageError::Write(err.to_string()))
    }
}
