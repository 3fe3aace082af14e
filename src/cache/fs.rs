//! Filesystem-backed cache namespace store.
//!
//! Each namespace is a directory under the cache root. An entry is a pair of
//! files named by the SHA-256 of its canonical key: `<hash>.meta.json`
//! (key, status, headers) and `<hash>.body` (raw bytes). The body is written
//! before the meta file, so a torn write leaves an entry that reads as a
//! miss rather than a corrupt hit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

use super::snapshot::Snapshot;
use super::{CacheNamespaces, Namespace};

pub struct FsCacheStore {
  root: PathBuf,
}

impl FsCacheStore {
  /// Open (creating if absent) a cache store rooted at `root`.
  pub fn open(root: &Path) -> Result<Self> {
    std::fs::create_dir_all(root)
      .map_err(|e| Error::StorageUnavailable(format!("create {}: {}", root.display(), e)))?;
    Ok(Self { root: root.to_path_buf() })
  }

  /// Open the store at the default cache location.
  pub fn open_default() -> Result<Self> {
    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| Error::StorageUnavailable("could not determine cache directory".into()))?;
    Self::open(&cache_dir.join("wittr"))
  }

  fn namespace_dir(&self, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\', '.']) {
      return Err(Error::Storage(format!("invalid namespace name: {:?}", name)));
    }
    Ok(self.root.join(name))
  }
}

#[async_trait]
impl CacheNamespaces for FsCacheStore {
  async fn open(&self, name: &str) -> Result<Arc<dyn Namespace>> {
    let dir = self.namespace_dir(name)?;
    tokio::fs::create_dir_all(&dir)
      .await
      .map_err(|e| Error::Storage(format!("create {}: {}", dir.display(), e)))?;
    Ok(Arc::new(FsNamespace { dir }))
  }

  async fn names(&self) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(&self.root)
      .await
      .map_err(|e| Error::Storage(format!("read {}: {}", self.root.display(), e)))?;

    while let Some(entry) = entries
      .next_entry()
      .await
      .map_err(|e| Error::Storage(e.to_string()))?
    {
      let is_dir = entry
        .file_type()
        .await
        .map(|t| t.is_dir())
        .unwrap_or(false);
      if is_dir {
        if let Ok(name) = entry.file_name().into_string() {
          names.push(name);
        }
      }
    }

    names.sort();
    Ok(names)
  }

  async fn remove(&self, name: &str) -> Result<bool> {
    let dir = self.namespace_dir(name)?;
    match tokio::fs::remove_dir_all(&dir).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(Error::Storage(format!("remove {}: {}", dir.display(), e))),
    }
  }
}

#[derive(Serialize, Deserialize)]
struct EntryMeta {
  key: String,
  status: u16,
  headers: Vec<(String, String)>,
}

struct FsNamespace {
  dir: PathBuf,
}

impl FsNamespace {
  fn meta_path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.meta.json", entry_stem(key)))
  }

  fn body_path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.body", entry_stem(key)))
  }
}

fn entry_stem(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

#[async_trait]
impl Namespace for FsNamespace {
  async fn get(&self, key: &str) -> Result<Option<Snapshot>> {
    let meta_bytes = match tokio::fs::read(self.meta_path(key)).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => {
        debug!(key, error = %e, "unreadable cache meta treated as miss");
        return Ok(None);
      }
    };

    let meta: EntryMeta = match serde_json::from_slice(&meta_bytes) {
      Ok(meta) => meta,
      Err(e) => {
        debug!(key, error = %e, "corrupt cache meta treated as miss");
        return Ok(None);
      }
    };

    let body = match tokio::fs::read(self.body_path(key)).await {
      Ok(body) => body,
      Err(e) => {
        debug!(key, error = %e, "missing cache body treated as miss");
        return Ok(None);
      }
    };

    Ok(Some(Snapshot {
      status: meta.status,
      headers: meta.headers,
      body,
    }))
  }

  async fn put(&self, key: &str, snapshot: Snapshot) -> Result<()> {
    let write_failed = |e: std::io::Error| Error::CacheWriteFailure {
      key: key.to_string(),
      reason: e.to_string(),
    };

    tokio::fs::write(self.body_path(key), &snapshot.body)
      .await
      .map_err(write_failed)?;

    let meta = EntryMeta {
      key: key.to_string(),
      status: snapshot.status,
      headers: snapshot.headers,
    };
    let meta_bytes = serde_json::to_vec(&meta).map_err(|e| Error::CacheWriteFailure {
      key: key.to_string(),
      reason: e.to_string(),
    })?;

    tokio::fs::write(self.meta_path(key), meta_bytes)
      .await
      .map_err(write_failed)
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut entries = tokio::fs::read_dir(&self.dir)
      .await
      .map_err(|e| Error::Storage(format!("read {}: {}", self.dir.display(), e)))?;

    while let Some(entry) = entries
      .next_entry()
      .await
      .map_err(|e| Error::Storage(e.to_string()))?
    {
      let path = entry.path();
      if !path.to_string_lossy().ends_with(".meta.json") {
        continue;
      }
      match tokio::fs::read(&path).await {
        Ok(bytes) => {
          if let Ok(meta) = serde_json::from_slice::<EntryMeta>(&bytes) {
            keys.push(meta.key);
          }
        }
        Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable cache meta"),
      }
    }

    keys.sort();
    Ok(keys)
  }

  async fn remove(&self, key: &str) -> Result<bool> {
    let existed = match tokio::fs::remove_file(self.meta_path(key)).await {
      Ok(()) => true,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
      Err(e) => return Err(Error::Storage(format!("remove entry {}: {}", key, e))),
    };
    // Body may be absent after a torn write
    let _ = tokio::fs::remove_file(self.body_path(key)).await;
    Ok(existed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> (tempfile::TempDir, FsCacheStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FsCacheStore::open(dir.path()).unwrap();
    (dir, store)
  }

  #[tokio::test]
  async fn test_round_trip_preserves_status_and_headers() {
    let (_dir, store) = store();
    let ns = store.open("wittr-content-imgs").await.unwrap();

    let mut snapshot = Snapshot::ok(b"jpeg-bytes".to_vec());
    snapshot.headers.push(("Content-Type".into(), "image/jpeg".into()));
    ns.put("/photos/1-abc.jpg", snapshot.clone()).await.unwrap();

    let hit = ns.get("/photos/1-abc.jpg").await.unwrap().unwrap();
    assert_eq!(hit, snapshot);
  }

  #[tokio::test]
  async fn test_keys_recovers_original_key_strings() {
    let (_dir, store) = store();
    let ns = store.open("wittr-content-imgs").await.unwrap();
    ns.put("/photos/a.jpg", Snapshot::ok(vec![1])).await.unwrap();
    ns.put("/avatars/sam.jpg", Snapshot::ok(vec![2])).await.unwrap();

    assert_eq!(ns.keys().await.unwrap(), ["/avatars/sam.jpg", "/photos/a.jpg"]);
  }

  #[tokio::test]
  async fn test_torn_write_reads_as_miss() {
    let (_dir, store) = store();
    let ns = store.open("wittr-content-imgs").await.unwrap();
    ns.put("/photos/a.jpg", Snapshot::ok(vec![1])).await.unwrap();

    // Remove the body to simulate a crash between the two writes
    let stem = entry_stem("/photos/a.jpg");
    tokio::fs::remove_file(_dir.path().join("wittr-content-imgs").join(format!("{}.body", stem)))
      .await
      .unwrap();

    assert!(ns.get("/photos/a.jpg").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_namespace_enumeration_and_removal() {
    let (_dir, store) = store();
    store.open("wittr-static-v8").await.unwrap();
    store.open("wittr-static-v9").await.unwrap();

    assert_eq!(store.names().await.unwrap(), ["wittr-static-v8", "wittr-static-v9"]);
    assert!(store.remove("wittr-static-v8").await.unwrap());
    assert!(!store.remove("wittr-static-v8").await.unwrap());
    assert_eq!(store.names().await.unwrap(), ["wittr-static-v9"]);
  }

  #[tokio::test]
  async fn test_invalid_namespace_name_is_rejected() {
    let (_dir, store) = store();
    assert!(store.open("../escape").await.is_err());
  }
}
