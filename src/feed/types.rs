//! Feed message data model.

use serde::{Deserialize, Serialize};

/// A single feed message as delivered by the live-update stream.
///
/// `id` is assigned by the origin and uniquely identifies a stored record;
/// re-ingesting the same `id` overwrites the previous record. `time` is the
/// sort key (milliseconds since the epoch). Fields the client does not
/// interpret are carried losslessly in `rest` so a stored message round-trips
/// byte-for-byte through the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
  pub id: String,
  pub time: i64,
  /// Canonical photo path (no width suffix), when the post has one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photo: Option<String>,
  /// Canonical avatar path (no density suffix).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar: Option<String>,
  #[serde(flatten)]
  pub rest: serde_json::Map<String, serde_json::Value>,
}

impl Message {
  #[cfg(test)]
  pub fn bare(id: &str, time: i64) -> Self {
    Self {
      id: id.to_string(),
      time,
      photo: None,
      avatar: None,
      rest: serde_json::Map::new(),
    }
  }
}
