//! Key/value persistence for trained state.
//!
//! The engine only ever stores opaque strings (exported embeddings, queue
//! snapshots) under a handful of fixed keys. Three backends:
//!
//! - [`MemoryStorage`]: process-local, used by tests and ephemeral runs
//! - [`SqliteStorage`]: single `kv` table in a `SQLite` file
//! - [`FileStorage`]: one file per key in a directory
//!
//! [`platform_default`] picks the file backend on mobile targets and `SQLite`
//! everywhere else.

use async_trait::async_trait;
use log::debug;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RecommendError;

pub type StorageResult<T> = Result<T, RecommendError>;

#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Short backend name for log lines.
    fn name(&self) -> &str;

    async fn save(&self, key: &str, data: &str) -> StorageResult<()>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, key: &str, data: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data.to_string());
        Ok(())
    }

    async fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// `SQLite`-backed storage. Statements are tiny, so they run inline on the
/// calling task.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and make sure the `kv` table
    /// exists.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if the file cannot be opened or the table created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if `SQLite` cannot allocate the database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT    PRIMARY KEY,
                data       TEXT    NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

#[async_trait]
impl PersistenceAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, key: &str, data: &str) -> StorageResult<()> {
        self.conn().execute(
            "INSERT INTO kv (key, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            (key, data, unix_now()),
        )?;
        debug!("Stored {} bytes under {key}", data.len());
        Ok(())
    }

    async fn load(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self
            .conn()
            .query_row("SELECT data FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(data)
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.conn().execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// One file per key under `dir`. Keys are sanitized into file names.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.dat"))
    }
}

#[async_trait]
impl PersistenceAdapter for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, key: &str, data: &str) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(key), data).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Storage backend for the current build target, rooted at `data_dir`.
///
/// # Errors
///
/// `PersistenceFailure` if the `SQLite` database cannot be opened.
pub fn platform_default(data_dir: &Path) -> StorageResult<Box<dyn PersistenceAdapter>> {
    if cfg!(any(target_os = "android", target_os = "ios")) {
        Ok(Box::new(FileStorage::new(data_dir.join("state"))))
    } else {
        Ok(Box::new(SqliteStorage::open(&data_dir.join("muse-radio.db3"))?))
    }
}
