//! Durable message store keyed by id with a secondary ordering index on time.
//!
//! The store is a capability object: the session owns exactly one
//! [`MessageStore`] handle, normally backed by SQLite. When the durable
//! backend cannot be opened the session degrades to [`NoopStore`] and the
//! feed keeps working without persistence.

pub mod cursor;
pub mod prune;
pub mod schema;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::feed::types::Message;

pub use cursor::ReverseCursor;
pub use prune::RetentionPruner;

/// Keyed record store with one descending-capable index on `(time, id)`.
#[async_trait]
pub trait MessageStore: Send + Sync {
  /// Insert or overwrite by `id`. The record and its index entry move in a
  /// single transaction.
  async fn put(&self, message: &Message) -> Result<()>;

  /// All messages ordered by `time` descending, ties broken by `id`
  /// descending.
  async fn get_all_by_time_desc(&self) -> Result<Vec<Message>>;

  /// Open a fresh descending cursor over the time index. Cursors are
  /// restartable per call, not resumable across calls.
  async fn open_reverse_cursor(&self) -> Result<Box<dyn ReverseCursor>>;
}

/// SQLite-backed message store.
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::StorageUnavailable(format!("create {}: {}", parent.display(), e)))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| Error::StorageUnavailable(format!("open {}: {}", path.display(), e)))?;

    Self::from_connection(conn)
  }

  /// In-memory store, used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    schema::apply(&conn)?;
    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
    })
  }

  /// Default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::StorageUnavailable("could not determine data directory".into()))?;

    Ok(data_dir.join("wittr").join("feed.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
  }
}

#[async_trait]
impl MessageStore for SqliteStore {
  async fn put(&self, message: &Message) -> Result<()> {
    let data = serde_json::to_vec(message)
      .map_err(|e| Error::Storage(format!("serialize message {}: {}", message.id, e)))?;

    let conn = self.lock()?;
    conn.execute(
      "INSERT INTO wittrs (id, time, data) VALUES (?1, ?2, ?3)
       ON CONFLICT(id) DO UPDATE SET time = excluded.time, data = excluded.data",
      params![message.id, message.time, data],
    )?;

    Ok(())
  }

  async fn get_all_by_time_desc(&self) -> Result<Vec<Message>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT data FROM wittrs ORDER BY time DESC, id DESC")?;

    let messages: Vec<Message> = stmt
      .query_map([], |row| {
        let data: Vec<u8> = row.get(0)?;
        Ok(data)
      })?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(messages)
  }

  async fn open_reverse_cursor(&self) -> Result<Box<dyn ReverseCursor>> {
    let newest = {
      let conn = self.lock()?;
      conn
        .query_row(
          "SELECT time, id FROM wittrs ORDER BY time DESC, id DESC LIMIT 1",
          [],
          |row| Ok(cursor::IndexKey { time: row.get(0)?, id: row.get(1)? }),
        )
        .optional()?
    };

    Ok(Box::new(cursor::SqliteReverseCursor::new(
      Arc::clone(&self.conn),
      newest,
    )))
  }
}

/// Store used when the durable backend is unavailable. Writes succeed
/// without persisting; reads come back empty.
pub struct NoopStore;

#[async_trait]
impl MessageStore for NoopStore {
  async fn put(&self, _message: &Message) -> Result<()> {
    Ok(()) // Discard
  }

  async fn get_all_by_time_desc(&self) -> Result<Vec<Message>> {
    Ok(Vec::new())
  }

  async fn open_reverse_cursor(&self) -> Result<Box<dyn ReverseCursor>> {
    Ok(Box::new(cursor::ExhaustedCursor))
  }
}
