//! In-memory cache namespace store.
//!
//! Backs tests, and the degraded session mode when no cache directory is
//! writable — entries then simply do not survive the process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::snapshot::Snapshot;
use super::{CacheNamespaces, Namespace};

type Entries = Arc<Mutex<HashMap<String, Snapshot>>>;

#[derive(Default)]
pub struct MemoryCacheStore {
  namespaces: Mutex<HashMap<String, Entries>>,
}

impl MemoryCacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entries>>> {
    self
      .namespaces
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
  }
}

#[async_trait]
impl CacheNamespaces for MemoryCacheStore {
  async fn open(&self, name: &str) -> Result<Arc<dyn Namespace>> {
    let mut namespaces = self.lock()?;
    let entries = namespaces.entry(name.to_string()).or_default().clone();
    Ok(Arc::new(MemoryNamespace { entries }))
  }

  async fn names(&self) -> Result<Vec<String>> {
    let namespaces = self.lock()?;
    let mut names: Vec<String> = namespaces.keys().cloned().collect();
    names.sort();
    Ok(names)
  }

  async fn remove(&self, name: &str) -> Result<bool> {
    let mut namespaces = self.lock()?;
    Ok(namespaces.remove(name).is_some())
  }
}

struct MemoryNamespace {
  entries: Entries,
}

impl MemoryNamespace {
  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Snapshot>>> {
    self
      .entries
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
  }
}

#[async_trait]
impl Namespace for MemoryNamespace {
  async fn get(&self, key: &str) -> Result<Option<Snapshot>> {
    Ok(self.lock()?.get(key).cloned())
  }

  async fn put(&self, key: &str, snapshot: Snapshot) -> Result<()> {
    self.lock()?.insert(key.to_string(), snapshot);
    Ok(())
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
    keys.sort();
    Ok(keys)
  }

  async fn remove(&self, key: &str) -> Result<bool> {
    Ok(self.lock()?.remove(key).is_some())
  }
}
