//! `SQLite`-backed key-value store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{
    migrations, ContextId, KeyValueStore, StorageEvent, StorageEvents, EVENT_CAPACITY,
    EXTERNAL_CONTEXT,
};
use crate::error::{Error, Result};

/// How long a write waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Context ids handed out to handles in this process.
static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Inner {
    conn: Connection,
    /// Last `PRAGMA data_version` seen; changes only on commits by other connections.
    data_version: i64,
}

/// A key-value store persisted in a `SQLite` database file.
///
/// Each handle owns one connection and acts as one context. Several handles
/// (in this or other processes) may open the same file.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    context: ContextId,
    inner: Mutex<Inner>,
    events: broadcast::Sender<StorageEvent>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening registry database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::initialize_schema(&conn)?;

        let store = Self::from_connection(path, conn)?;
        info!(context = store.context, "Registry database opened at {}", store.path.display());
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Self::from_connection(PathBuf::from(":memory:"), conn)
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Result<Self> {
        let data_version = read_data_version(&conn)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            path,
            context: NEXT_CONTEXT.fetch_add(1, Ordering::SeqCst),
            inner: Mutex::new(Inner { conn, data_version }),
            events,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }
}

fn read_data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

impl KeyValueStore for SqliteStore {
    fn context(&self) -> ContextId {
        self.context
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.lock()?;
        let value = inner
            .conn
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let inner = self.lock()?;
        inner
            .conn
            .execute(
                r"
                INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                ",
                params![key, value],
            )
            .map_err(|e| Error::storage_write(key, e.to_string()))?;

        debug!(context = self.context, key, bytes = value.len(), "Stored entry");
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents::new(self.context, self.events.subscribe())
    }

    fn poll_changes(&self) -> Result<bool> {
        let mut inner = self.lock()?;
        let current = read_data_version(&inner.conn)?;
        if current == inner.data_version {
            return Ok(false);
        }

        inner.data_version = current;
        drop(inner);

        debug!(context = self.context, "Detected write from another connection");
        let _ = self.events.send(StorageEvent {
            key: None,
            origin: EXTERNAL_CONTEXT,
        });
        Ok(true)
    }
}
