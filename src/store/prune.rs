//! Bounded retention for the message store.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Error;
use crate::store::{MessageStore, ReverseCursor};

/// Default retention window.
pub const DEFAULT_RETENTION: usize = 30;

/// Prunes the store down to the newest `keep` messages.
///
/// Runs after every ingested batch. Pruning is not atomic with ingestion;
/// a crash between insert and prune can transiently leave more than `keep`
/// records, which the next pass cleans up.
pub struct RetentionPruner {
  store: Arc<dyn MessageStore>,
  keep: usize,
}

impl RetentionPruner {
  pub fn new(store: Arc<dyn MessageStore>, keep: usize) -> Self {
    Self { store, keep }
  }

  /// Walk the time index newest-first, skip the `keep` entries to retain,
  /// delete the rest.
  ///
  /// All failures are swallowed here: a failed step abandons the remaining
  /// walk and the next scheduled prune continues the cleanup.
  pub async fn prune(&self) {
    let mut cursor = match self.store.open_reverse_cursor().await {
      Ok(cursor) => cursor,
      Err(e) => {
        warn!(error = %e, "retention prune could not open cursor");
        return;
      }
    };

    match cursor.advance(self.keep).await {
      // Fewer than `keep` entries; nothing to delete
      Ok(false) => return,
      Ok(true) => {}
      Err(e) => {
        warn!(error = %e, "retention prune aborted while skipping retained entries");
        return;
      }
    }

    let mut deleted = 0usize;
    loop {
      match cursor.delete_and_advance().await {
        Ok(true) => deleted += 1,
        Ok(false) => {
          deleted += 1;
          break;
        }
        Err(e) => {
          let e = Error::PruneStepFailure(e.to_string());
          warn!(error = %e, deleted, "retention walk abandoned");
          return;
        }
      }
    }

    debug!(deleted, keep = self.keep, "retention prune complete");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::types::Message;
  use crate::store::{NoopStore, SqliteStore};

  #[tokio::test]
  async fn test_prune_keeps_the_k_newest() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    // Times 10, 20, ..., 400
    for i in 1..=40 {
      store.put(&Message::bare(&format!("m{:02}", i), i * 10)).await.unwrap();
    }

    RetentionPruner::new(store.clone(), 30).prune().await;

    let remaining = store.get_all_by_time_desc().await.unwrap();
    assert_eq!(remaining.len(), 30);
    assert_eq!(remaining[0].time, 400);
    assert_eq!(remaining[29].time, 110);
  }

  #[tokio::test]
  async fn test_prune_under_capacity_is_a_noop() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    for i in 1..=5 {
      store.put(&Message::bare(&format!("m{}", i), i)).await.unwrap();
    }

    let pruner = RetentionPruner::new(store.clone(), 30);
    pruner.prune().await;
    assert_eq!(store.get_all_by_time_desc().await.unwrap().len(), 5);

    // At exactly the limit nothing is deleted either
    for i in 6..=30 {
      store.put(&Message::bare(&format!("m{}", i), i)).await.unwrap();
    }
    pruner.prune().await;
    assert_eq!(store.get_all_by_time_desc().await.unwrap().len(), 30);
  }

  #[tokio::test]
  async fn test_prune_is_idempotent() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    for i in 1..=35 {
      store.put(&Message::bare(&format!("m{:02}", i), i)).await.unwrap();
    }

    let pruner = RetentionPruner::new(store.clone(), 30);
    pruner.prune().await;
    pruner.prune().await;

    assert_eq!(store.get_all_by_time_desc().await.unwrap().len(), 30);
  }

  #[tokio::test]
  async fn test_prune_against_noop_store_does_nothing() {
    RetentionPruner::new(Arc::new(NoopStore), 30).prune().await;
  }

  #[tokio::test]
  async fn test_prune_breaks_time_ties_deterministically() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    for id in ["a", "b", "c", "d"] {
      store.put(&Message::bare(id, 100)).await.unwrap();
    }

    RetentionPruner::new(store.clone(), 2).prune().await;

    let ids: Vec<_> = store
      .get_all_by_time_desc()
      .await
      .unwrap()
      .into_iter()
      .map(|m| m.id)
      .collect();
    // Greatest ids win the tie
    assert_eq!(ids, ["d", "c"]);
  }
}
