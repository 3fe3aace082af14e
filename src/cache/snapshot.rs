//! Response snapshot stored in cache namespaces.

use serde::{Deserialize, Serialize};

/// A materialized HTTP response: status, headers, and the full body.
///
/// Unlike a live response, whose body is consumable exactly once, a snapshot
/// is `Clone` — callers clone it before storing and returning the same
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Snapshot {
  /// A 200 response with the given body and no headers.
  pub fn ok(body: impl Into<Vec<u8>>) -> Self {
    Self {
      status: 200,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// First header value with the given name, case-insensitive.
  #[allow(dead_code)]
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}
