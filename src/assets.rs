//! Static asset cache lifecycle: versioned install and activation cleanup.
//!
//! Install populates one immutable namespace (`wittr-static-v<N>`) from a
//! fixed manifest; activation deletes every superseded application namespace.
//! There is no reference counting — the allowlist (current static version +
//! the shared image namespace) is the only garbage-collection mechanism.

use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheNamespaces, Snapshot};
use crate::error::{Error, Result};
use crate::images::CONTENT_IMAGES_CACHE;
use crate::net::Fetch;

/// Prefix identifying cache namespaces owned by this application.
pub const CACHE_PREFIX: &str = "wittr-";

/// Namespace name for a static cache version.
pub fn static_cache_name(version: u32) -> String {
  format!("wittr-static-v{}", version)
}

pub struct StaticAssets {
  cache: Arc<dyn CacheNamespaces>,
  fetcher: Arc<dyn Fetch>,
  base: Url,
  version: u32,
  manifest: Vec<String>,
}

impl StaticAssets {
  pub fn new(
    cache: Arc<dyn CacheNamespaces>,
    fetcher: Arc<dyn Fetch>,
    base: Url,
    version: u32,
    manifest: Vec<String>,
  ) -> Self {
    Self { cache, fetcher, base, version, manifest }
  }

  /// Fetch the whole manifest and commit it as the new static version.
  ///
  /// Population is all-or-nothing: entries are staged in memory first, and
  /// a namespace half-written because of a put failure is deleted before
  /// the error propagates. No partial cache is ever left active.
  pub async fn install(&self) -> Result<()> {
    let name = static_cache_name(self.version);

    let mut staged = Vec::with_capacity(self.manifest.len());
    for entry in &self.manifest {
      let url = self.entry_url(entry)?;
      let response = self.fetcher.fetch(&url).await?;
      if !response.is_success() {
        return Err(Error::TransientNetworkFailure {
          url,
          reason: format!("manifest fetch returned {}", response.status),
        });
      }
      staged.push((entry.clone(), response));
    }

    if let Err(e) = self.populate(&name, staged).await {
      let _ = self.cache.remove(&name).await;
      return Err(e);
    }

    info!(cache = %name, entries = self.manifest.len(), "static cache installed");
    Ok(())
  }

  async fn populate(&self, name: &str, staged: Vec<(String, Snapshot)>) -> Result<()> {
    let namespace = self.cache.open(name).await?;
    for (key, response) in staged {
      namespace.put(&key, response).await?;
    }
    Ok(())
  }

  /// Delete every application namespace that is neither the current static
  /// version nor the shared image cache.
  pub async fn activate(&self) -> Result<()> {
    let current = static_cache_name(self.version);

    for name in self.cache.names().await? {
      let ours = name.starts_with(CACHE_PREFIX);
      if !ours || name == current || name == CONTENT_IMAGES_CACHE {
        continue;
      }
      match self.cache.remove(&name).await {
        Ok(_) => info!(cache = %name, "deleted superseded cache"),
        // Cleanup is retried on the next activation
        Err(e) => warn!(cache = %name, error = %e, "failed to delete superseded cache"),
      }
    }

    Ok(())
  }

  /// Absolute fetch URL for a manifest entry. Entries may be
  /// origin-relative (`/skeleton`, `js/main.js`) or absolute (font CDNs).
  fn entry_url(&self, entry: &str) -> Result<String> {
    if Url::parse(entry).is_ok() {
      return Ok(entry.to_string());
    }
    self
      .base
      .join(entry)
      .map(|u| u.to_string())
      .map_err(|e| Error::TransientNetworkFailure {
        url: entry.to_string(),
        reason: format!("invalid manifest entry: {}", e),
      })
  }
}
