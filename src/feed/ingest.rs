//! Stream ingestor: persists inbound batches and forwards them to the view.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::images::ImageGateway;
use crate::store::{MessageStore, RetentionPruner};

use super::types::Message;
use super::view::FeedView;

/// Consumes raw message batches from the live-update channel.
///
/// Per batch: parse, persist each message in payload order, kick off a
/// retention prune (fire-and-forget), forward the batch unmodified to the
/// view. Persistence failures never block forwarding; a parse failure drops
/// the batch and leaves the channel open.
pub struct Ingestor {
  store: Arc<dyn MessageStore>,
  pruner: Arc<RetentionPruner>,
  view: Arc<dyn FeedView>,
  gateway: Option<Arc<ImageGateway>>,
}

impl Ingestor {
  pub fn new(
    store: Arc<dyn MessageStore>,
    pruner: Arc<RetentionPruner>,
    view: Arc<dyn FeedView>,
  ) -> Self {
    Self { store, pruner, view, gateway: None }
  }

  /// Warm the image cache through the gateway for each ingested post.
  pub fn with_gateway(mut self, gateway: Arc<ImageGateway>) -> Self {
    self.gateway = Some(gateway);
    self
  }

  /// Handle one raw payload from the live-update channel.
  ///
  /// The returned prune handle is detached by callers; tests await it.
  pub async fn on_batch(&self, raw: &str) -> Result<JoinHandle<()>> {
    let messages: Vec<Message> =
      serde_json::from_str(raw).map_err(|e| Error::MalformedBatch(e.to_string()))?;

    for message in &messages {
      if let Err(e) = self.store.put(message).await {
        warn!(id = %message.id, error = %e, "message not persisted");
      }
    }

    let pruner = Arc::clone(&self.pruner);
    let prune = tokio::spawn(async move { pruner.prune().await });

    self.view.add_posts(&messages);
    self.warm_images(&messages);

    Ok(prune)
  }

  /// Request the default-size variant of each referenced image so the
  /// shared cache fills while the connection is up. Best effort.
  fn warm_images(&self, messages: &[Message]) {
    let Some(gateway) = &self.gateway else { return };

    let mut variants = Vec::new();
    for message in messages {
      if let Some(photo) = &message.photo {
        variants.push(format!("{}-800px.jpg", photo));
      }
      if let Some(avatar) = &message.avatar {
        variants.push(format!("{}-2x.jpg", avatar));
      }
    }
    if variants.is_empty() {
      return;
    }

    let gateway = Arc::clone(gateway);
    tokio::spawn(async move {
      for url in variants {
        if let Err(e) = gateway.resolve(&url).await {
          debug!(url = %url, error = %e, "image warm fetch failed");
        }
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::view::FeedView;
  use crate::store::SqliteStore;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingView {
    batches: Mutex<Vec<Vec<String>>>,
  }

  impl FeedView for RecordingView {
    fn add_posts(&self, posts: &[Message]) {
      let ids = posts.iter().map(|p| p.id.clone()).collect();
      self.batches.lock().unwrap().push(ids);
    }

    fn showing_posts(&self) -> bool {
      !self.batches.lock().unwrap().is_empty()
    }

    fn latest_post_date(&self) -> Option<i64> {
      None
    }

    fn connection_lost(&self) {}
    fn connection_restored(&self) {}
  }

  fn ingestor(keep: usize) -> (Arc<SqliteStore>, Arc<RecordingView>, Ingestor) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let view = Arc::new(RecordingView::default());
    let pruner = Arc::new(RetentionPruner::new(store.clone(), keep));
    let ingestor = Ingestor::new(store.clone(), pruner, view.clone());
    (store, view, ingestor)
  }

  #[tokio::test]
  async fn test_batch_is_persisted_and_forwarded_in_order() {
    let (store, view, ingestor) = ingestor(30);

    let prune = ingestor
      .on_batch(r#"[{"id":"b","time":20},{"id":"a","time":10}]"#)
      .await
      .unwrap();
    prune.await.unwrap();

    // Forwarded in payload order, not time order
    assert_eq!(*view.batches.lock().unwrap(), vec![vec!["b".to_string(), "a".to_string()]]);
    assert_eq!(store.get_all_by_time_desc().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_malformed_batch_is_dropped_and_channel_survives() {
    let (store, view, ingestor) = ingestor(30);

    let err = ingestor.on_batch("{not json").await.unwrap_err();
    assert!(matches!(err, Error::MalformedBatch(_)));
    assert!(view.batches.lock().unwrap().is_empty());

    // The next batch still lands
    let prune = ingestor.on_batch(r#"[{"id":"a","time":1}]"#).await.unwrap();
    prune.await.unwrap();
    assert_eq!(store.get_all_by_time_desc().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_ingest_triggers_retention_prune() {
    let (store, _view, ingestor) = ingestor(3);

    let batch: Vec<_> = (1..=5).map(|i| format!(r#"{{"id":"m{}","time":{}}}"#, i, i * 10)).collect();
    let prune = ingestor
      .on_batch(&format!("[{}]", batch.join(",")))
      .await
      .unwrap();
    prune.await.unwrap();

    let times: Vec<_> = store
      .get_all_by_time_desc()
      .await
      .unwrap()
      .into_iter()
      .map(|m| m.time)
      .collect();
    assert_eq!(times, [50, 40, 30]);
  }

  #[tokio::test]
  async fn test_forwarding_survives_a_noop_store() {
    let view = Arc::new(RecordingView::default());
    let store: Arc<dyn MessageStore> = Arc::new(crate::store::NoopStore);
    let pruner = Arc::new(RetentionPruner::new(store.clone(), 30));
    let ingestor = Ingestor::new(store, pruner, view.clone());

    let prune = ingestor.on_batch(r#"[{"id":"a","time":1}]"#).await.unwrap();
    prune.await.unwrap();
    assert!(view.showing_posts());
  }
}
