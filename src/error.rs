//! Failure taxonomy for the feed cache coordinator.
//!
//! Background maintenance failures (pruning, cache refresh) are swallowed at
//! the call site and logged; only failures that affect an in-flight response
//! with no cached fallback propagate to the caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// The durable backend could not be opened. The session degrades to a
  /// no-op store and continues without persistence.
  #[error("durable storage unavailable: {0}")]
  StorageUnavailable(String),

  /// A storage backend operation failed after open (transaction, cursor
  /// step, namespace read).
  #[error("storage operation failed: {0}")]
  Storage(String),

  /// An inbound batch could not be parsed. The batch is dropped; the
  /// ingestion channel stays open.
  #[error("malformed batch: {0}")]
  MalformedBatch(String),

  /// A network fetch failed. Served from cache when possible, otherwise
  /// surfaced as resource-unavailable.
  #[error("fetch failed for {url}: {reason}")]
  TransientNetworkFailure { url: String, reason: String },

  /// A best-effort cache population failed. Never blocks returning a
  /// response to the caller.
  #[error("cache write failed for {key}: {reason}")]
  CacheWriteFailure { key: String, reason: String },

  /// A single delete step of a retention walk failed. The remaining walk is
  /// abandoned; the next scheduled prune continues the cleanup.
  #[error("prune step failed: {0}")]
  PruneStepFailure(String),
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    Error::Storage(err.to_string())
  }
}
