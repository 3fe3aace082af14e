//! Offline-first resolution of image and asset requests.
//!
//! Every request is keyed into the shared image namespace by its canonical
//! storage key, then served by the family's freshness strategy:
//!
//! - photos: cache-or-fetch — at most one network fetch per distinct
//!   canonical key while the entry lives;
//! - avatars: stale-while-revalidate — a cached copy is returned
//!   immediately while a concurrent network fetch refreshes the entry;
//! - everything else: match any namespace, else fetch (no populate).

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheNamespaces, Namespace, Snapshot};
use crate::error::{Error, Result};
use crate::net::Fetch;

use super::keys::{derive_key, Family};

/// Shared namespace for both image families.
pub const CONTENT_IMAGES_CACHE: &str = "wittr-content-imgs";

pub struct ImageGateway {
  cache: Arc<dyn CacheNamespaces>,
  fetcher: Arc<dyn Fetch>,
  base: Option<Url>,
}

impl ImageGateway {
  pub fn new(cache: Arc<dyn CacheNamespaces>, fetcher: Arc<dyn Fetch>) -> Self {
    Self { cache, fetcher, base: None }
  }

  /// Resolve origin-relative request paths against this base when fetching.
  pub fn with_base(mut self, base: Url) -> Self {
    self.base = Some(base);
    self
  }

  /// Absolute URL to fetch for a request. Cache keys stay path-based.
  fn fetch_url(&self, url: &str) -> String {
    if Url::parse(url).is_ok() {
      return url.to_string();
    }
    match &self.base {
      Some(base) => base
        .join(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string()),
      None => url.to_string(),
    }
  }

  /// Resolve one request offline-first.
  ///
  /// Fails only when the resource is unavailable from both the cache and
  /// the network.
  pub async fn resolve(&self, url: &str) -> Result<Snapshot> {
    match derive_key(url) {
      Some((Family::Photo, key)) => self.serve_photo(url, &key).await,
      Some((Family::Avatar, key)) => self.serve_avatar(url, &key).await,
      None => self.serve_default(url).await,
    }
  }

  /// Cache-or-fetch: a hit never touches the network.
  async fn serve_photo(&self, url: &str, key: &str) -> Result<Snapshot> {
    let cache = self.cache.open(CONTENT_IMAGES_CACHE).await?;

    match cache.get(key).await {
      Ok(Some(hit)) => return Ok(hit),
      Ok(None) => {}
      Err(e) => debug!(key, error = %e, "cache read failed, treating as miss"),
    }

    let response = self.fetcher.fetch(&self.fetch_url(url)).await?;
    store_best_effort(&cache, key, &response).await;
    Ok(response)
  }

  /// Stale-while-revalidate: the cache lookup and the network fetch start
  /// without sequential dependency. A hit returns immediately while the
  /// fetch refreshes the entry in the background; a miss waits for the
  /// fetch.
  async fn serve_avatar(&self, url: &str, key: &str) -> Result<Snapshot> {
    let cache = self.cache.open(CONTENT_IMAGES_CACHE).await?;
    let revalidate = self.spawn_revalidate(Arc::clone(&cache), url, key);

    let cached = match cache.get(key).await {
      Ok(cached) => cached,
      Err(e) => {
        debug!(key, error = %e, "cache read failed, treating as miss");
        None
      }
    };

    if let Some(hit) = cached {
      // The revalidate task keeps running and overwrites the entry when
      // the network answers; its failure was already logged there.
      return Ok(hit);
    }

    match revalidate.await {
      Ok(result) => result,
      Err(join_error) => Err(Error::TransientNetworkFailure {
        url: url.to_string(),
        reason: format!("revalidate task failed: {}", join_error),
      }),
    }
  }

  fn spawn_revalidate(
    &self,
    cache: Arc<dyn Namespace>,
    url: &str,
    key: &str,
  ) -> JoinHandle<Result<Snapshot>> {
    let fetcher = Arc::clone(&self.fetcher);
    let url = self.fetch_url(url);
    let key = key.to_string();

    tokio::spawn(async move {
      match fetcher.fetch(&url).await {
        Ok(response) => {
          store_best_effort(&cache, &key, &response).await;
          Ok(response)
        }
        Err(e) => {
          debug!(url = %url, error = %e, "avatar revalidation fetch failed");
          Err(e)
        }
      }
    })
  }

  /// Default handling for requests outside both families: serve any cached
  /// copy, else go to the network without populating a cache.
  async fn serve_default(&self, url: &str) -> Result<Snapshot> {
    match self.cache.get_any(url).await {
      Ok(Some(hit)) => return Ok(hit),
      Ok(None) => {}
      Err(e) => debug!(url, error = %e, "cache lookup failed, going to network"),
    }

    // Static entries are stored under origin-relative paths
    let path = super::keys::request_path(url);
    if path != url {
      match self.cache.get_any(&path).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => debug!(url, error = %e, "cache lookup failed, going to network"),
      }
    }

    self.fetcher.fetch(&self.fetch_url(url)).await
  }
}

/// Populate the cache without letting a write failure block the response.
async fn store_best_effort(cache: &Arc<dyn Namespace>, key: &str, response: &Snapshot) {
  if !response.is_success() {
    debug!(key, status = response.status, "not caching unsuccessful response");
    return;
  }
  if let Err(e) = cache.put(key, response.clone()).await {
    warn!(key, error = %e, "cache populate failed");
  }
}
