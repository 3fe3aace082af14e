//! Session controller.
//!
//! Owns the injected collaborators (store, cache namespaces, view) and runs
//! the session: replay cached posts into the view, keep the image cache
//! bounded to what the stored posts reference, and follow the live-update
//! channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::CacheNamespaces;
use crate::feed::{transport, FeedView, Ingestor, TransportConfig};
use crate::images::CONTENT_IMAGES_CACHE;
use crate::store::MessageStore;

/// How often the image cache is swept for unreferenced entries.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Controller {
  store: Arc<dyn MessageStore>,
  cache: Arc<dyn CacheNamespaces>,
  view: Arc<dyn FeedView>,
  ingestor: Arc<Ingestor>,
  transport: TransportConfig,
}

impl Controller {
  pub fn new(
    store: Arc<dyn MessageStore>,
    cache: Arc<dyn CacheNamespaces>,
    view: Arc<dyn FeedView>,
    ingestor: Arc<Ingestor>,
    transport: TransportConfig,
  ) -> Self {
    Self { store, cache, view, ingestor, transport }
  }

  /// Run the session. Never returns under normal operation.
  pub async fn run(&self) {
    self.show_cached_messages().await;

    clean_image_cache(self.store.as_ref(), self.cache.as_ref()).await;
    self.spawn_cleanup_interval();

    transport::run(
      self.transport.clone(),
      Arc::clone(&self.ingestor),
      Arc::clone(&self.view),
    )
    .await;
  }

  /// Replay persisted posts into the view, newest first. Skipped when the
  /// view already shows posts.
  async fn show_cached_messages(&self) {
    if self.view.showing_posts() {
      return;
    }

    match self.store.get_all_by_time_desc().await {
      Ok(messages) if messages.is_empty() => {}
      Ok(messages) => self.view.add_posts(&messages),
      Err(e) => warn!(error = %e, "could not replay cached messages"),
    }
  }

  /// The image cache grows while the session stays open; sweep it on an
  /// interval in addition to the startup pass.
  fn spawn_cleanup_interval(&self) {
    let store = Arc::clone(&self.store);
    let cache = Arc::clone(&self.cache);

    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
      ticker.tick().await; // first tick is immediate; startup already swept
      loop {
        ticker.tick().await;
        clean_image_cache(store.as_ref(), cache.as_ref()).await;
      }
    });
  }
}

/// Delete image cache entries no longer referenced by any stored message.
///
/// Best effort throughout: any failure leaves the sweep to a later pass.
pub async fn clean_image_cache(store: &dyn MessageStore, cache: &dyn CacheNamespaces) {
  let messages = match store.get_all_by_time_desc().await {
    Ok(messages) => messages,
    Err(e) => {
      warn!(error = %e, "image cache sweep could not read the store");
      return;
    }
  };

  let mut needed: HashSet<&str> = HashSet::new();
  for message in &messages {
    if let Some(photo) = &message.photo {
      needed.insert(photo);
    }
    if let Some(avatar) = &message.avatar {
      needed.insert(avatar);
    }
  }

  let namespace = match cache.open(CONTENT_IMAGES_CACHE).await {
    Ok(namespace) => namespace,
    Err(e) => {
      warn!(error = %e, "image cache sweep could not open the namespace");
      return;
    }
  };
  let keys = match namespace.keys().await {
    Ok(keys) => keys,
    Err(e) => {
      warn!(error = %e, "image cache sweep could not list entries");
      return;
    }
  };

  for key in keys {
    if needed.contains(key.as_str()) {
      continue;
    }
    match namespace.remove(&key).await {
      Ok(_) => debug!(key = %key, "dropped unreferenced image"),
      Err(e) => debug!(key = %key, error = %e, "failed to drop unreferenced image"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryCacheStore, Namespace, Snapshot};
  use crate::feed::types::Message;
  use crate::store::SqliteStore;

  async fn seeded_cache(keys: &[&str]) -> (Arc<MemoryCacheStore>, Arc<dyn Namespace>) {
    let cache = Arc::new(MemoryCacheStore::new());
    let ns = cache.open(CONTENT_IMAGES_CACHE).await.unwrap();
    for key in keys {
      ns.put(key, Snapshot::ok(vec![1])).await.unwrap();
    }
    (cache, ns)
  }

  #[tokio::test]
  async fn test_sweep_keeps_referenced_images_only() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut message = Message::bare("m1", 1);
    message.photo = Some("/photos/keep".into());
    message.avatar = Some("/avatars/sam".into());
    store.put(&message).await.unwrap();

    let (cache, ns) =
      seeded_cache(&["/photos/keep", "/photos/stale", "/avatars/sam", "/avatars/old"]).await;

    clean_image_cache(&store, cache.as_ref()).await;

    assert_eq!(ns.keys().await.unwrap(), ["/avatars/sam", "/photos/keep"]);
  }

  #[tokio::test]
  async fn test_sweep_of_empty_store_clears_namespace() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (cache, ns) = seeded_cache(&["/photos/stale"]).await;

    clean_image_cache(&store, cache.as_ref()).await;

    assert!(ns.keys().await.unwrap().is_empty());
  }
}
