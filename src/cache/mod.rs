//! Named cache namespaces holding key → response-snapshot pairs.
//!
//! This is the storage half of the image gateway and the static asset
//! lifecycle. Namespaces are capability objects so the core logic runs
//! against an in-memory backend in tests (and as the degraded mode when no
//! cache directory is writable) and against the filesystem in production.

pub mod fs;
pub mod memory;
pub mod snapshot;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

pub use fs::FsCacheStore;
pub use memory::MemoryCacheStore;
pub use snapshot::Snapshot;

/// An enumerable collection of named cache namespaces.
#[async_trait]
pub trait CacheNamespaces: Send + Sync {
  /// Open (creating if absent) the namespace with the given name.
  async fn open(&self, name: &str) -> Result<Arc<dyn Namespace>>;

  /// Names of all existing namespaces.
  async fn names(&self) -> Result<Vec<String>>;

  /// Delete a whole namespace. Returns whether it existed.
  async fn remove(&self, name: &str) -> Result<bool>;

  /// Look `key` up across every namespace, in no particular order.
  async fn get_any(&self, key: &str) -> Result<Option<Snapshot>> {
    for name in self.names().await? {
      if let Some(hit) = self.open(&name).await?.get(key).await? {
        return Ok(Some(hit));
      }
    }
    Ok(None)
  }
}

/// One namespace: snapshots addressable by canonical string key.
#[async_trait]
pub trait Namespace: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<Snapshot>>;

  /// Insert or overwrite. Last writer wins; concurrent writers to the same
  /// key are expected to carry byte-equivalent responses.
  async fn put(&self, key: &str, snapshot: Snapshot) -> Result<()>;

  /// All keys currently present.
  async fn keys(&self) -> Result<Vec<String>>;

  /// Delete one entry. Returns whether it existed.
  async fn remove(&self, key: &str) -> Result<bool>;
}
