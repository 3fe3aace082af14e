//! Reverse cursor over the time index.
//!
//! The cursor walks `(time, id)` in descending order one statement at a
//! time. Every step (skip or delete-and-step) runs as its own statement, so
//! an async caller suspends between steps instead of holding the store for
//! the whole walk.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Position of a cursor in the time index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
  pub time: i64,
  pub id: String,
}

/// Lazily-advanced descending index traversal.
///
/// A freshly opened cursor sits on the newest entry (or is exhausted when
/// the store is empty).
#[async_trait]
pub trait ReverseCursor: Send {
  /// Key under the cursor, or `None` once exhausted.
  fn current(&self) -> Option<&IndexKey>;

  /// Skip past `n` entries. Returns `true` while the cursor still sits on
  /// an entry afterwards.
  async fn advance(&mut self, n: usize) -> Result<bool>;

  /// Delete the entry under the cursor, then step to the next older one.
  /// Returns `true` while the cursor still sits on an entry afterwards.
  async fn delete_and_advance(&mut self) -> Result<bool>;
}

pub struct SqliteReverseCursor {
  conn: Arc<Mutex<Connection>>,
  position: Option<IndexKey>,
}

impl SqliteReverseCursor {
  pub(super) fn new(conn: Arc<Mutex<Connection>>, position: Option<IndexKey>) -> Self {
    Self { conn, position }
  }

  /// Move to the entry `offset + 1` places older than the current one.
  fn seek_older(&mut self, offset: usize) -> Result<bool> {
    let Some(pos) = self.position.clone() else {
      return Ok(false);
    };

    let conn = self
      .conn
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))?;

    let next = conn
      .query_row(
        "SELECT time, id FROM wittrs
         WHERE time < ?1 OR (time = ?1 AND id < ?2)
         ORDER BY time DESC, id DESC
         LIMIT 1 OFFSET ?3",
        params![pos.time, pos.id, offset as i64],
        |row| Ok(IndexKey { time: row.get(0)?, id: row.get(1)? }),
      )
      .optional()?;

    self.position = next;
    Ok(self.position.is_some())
  }
}

#[async_trait]
impl ReverseCursor for SqliteReverseCursor {
  fn current(&self) -> Option<&IndexKey> {
    self.position.as_ref()
  }

  async fn advance(&mut self, n: usize) -> Result<bool> {
    if n == 0 {
      return Ok(self.position.is_some());
    }
    self.seek_older(n - 1)
  }

  async fn delete_and_advance(&mut self) -> Result<bool> {
    let Some(pos) = self.position.clone() else {
      return Ok(false);
    };

    {
      let conn = self
        .conn
        .lock()
        .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))?;
      conn.execute("DELETE FROM wittrs WHERE id = ?1", params![pos.id])?;
    }

    // Entries older than the deleted key are unaffected by the delete, so
    // the next position is found from the same key.
    self.seek_older(0)
  }
}

/// Cursor over nothing. Returned by the no-op store.
pub struct ExhaustedCursor;

#[async_trait]
impl ReverseCursor for ExhaustedCursor {
  fn current(&self) -> Option<&IndexKey> {
    None
  }

  async fn advance(&mut self, _n: usize) -> Result<bool> {
    Ok(false)
  }

  async fn delete_and_advance(&mut self) -> Result<bool> {
    Ok(false)
  }
}

#[cfg(test)]
mod tests {
  use super::ReverseCursor;
  use crate::feed::types::Message;
  use crate::store::{MessageStore, SqliteStore};

  async fn store_with_times(times: &[i64]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    for (i, t) in times.iter().enumerate() {
      store.put(&Message::bare(&format!("m{}", i), *t)).await.unwrap();
    }
    store
  }

  #[tokio::test]
  async fn test_cursor_starts_on_newest() {
    let store = store_with_times(&[10, 30, 20]).await;
    let cursor = store.open_reverse_cursor().await.unwrap();
    assert_eq!(cursor.current().unwrap().time, 30);
  }

  #[tokio::test]
  async fn test_cursor_on_empty_store_is_exhausted() {
    let store = store_with_times(&[]).await;
    let mut cursor = store.open_reverse_cursor().await.unwrap();
    assert!(cursor.current().is_none());
    assert!(!cursor.advance(3).await.unwrap());
  }

  #[tokio::test]
  async fn test_advance_skips_in_descending_order() {
    let store = store_with_times(&[10, 20, 30, 40]).await;
    let mut cursor = store.open_reverse_cursor().await.unwrap();

    assert!(cursor.advance(2).await.unwrap());
    assert_eq!(cursor.current().unwrap().time, 20);

    // Skipping past the end exhausts the cursor
    assert!(!cursor.advance(5).await.unwrap());
    assert!(cursor.current().is_none());
  }

  #[tokio::test]
  async fn test_delete_and_advance_walks_to_exhaustion() {
    let store = store_with_times(&[10, 20, 30]).await;
    let mut cursor = store.open_reverse_cursor().await.unwrap();

    assert!(cursor.advance(1).await.unwrap());
    assert!(cursor.delete_and_advance().await.unwrap());
    assert!(!cursor.delete_and_advance().await.unwrap());

    let remaining = store.get_all_by_time_desc().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].time, 30);
  }

  #[tokio::test]
  async fn test_cursor_orders_equal_times_by_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    for id in ["a", "b", "c"] {
      store.put(&Message::bare(id, 50)).await.unwrap();
    }

    let mut cursor = store.open_reverse_cursor().await.unwrap();
    assert_eq!(cursor.current().unwrap().id, "c");
    assert!(cursor.advance(1).await.unwrap());
    assert_eq!(cursor.current().unwrap().id, "b");
    assert!(cursor.advance(1).await.unwrap());
    assert_eq!(cursor.current().unwrap().id, "a");
  }
}
