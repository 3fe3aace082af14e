//! Rendering collaborator interface.
//!
//! The real rendering layer lives outside this crate; the coordinator only
//! needs to hand it post batches, ask whether posts are already showing, and
//! surface connection-loss notices. [`LogView`] is the headless binary's
//! implementation, writing posts to the log.

use chrono::DateTime;
use std::sync::Mutex;
use tracing::{info, warn};

use super::types::Message;

pub trait FeedView: Send + Sync {
  /// Display a batch of posts, in the caller-provided order.
  fn add_posts(&self, posts: &[Message]);

  /// Whether any posts are currently displayed.
  fn showing_posts(&self) -> bool;

  /// Timestamp (ms) of the newest displayed post.
  fn latest_post_date(&self) -> Option<i64>;

  /// Surface a persistent connection-loss notice. Stays up until
  /// [`FeedView::connection_restored`].
  fn connection_lost(&self);

  /// Clear the connection-loss notice.
  fn connection_restored(&self);
}

#[derive(Default)]
struct LogViewState {
  latest: Option<i64>,
  showing: bool,
  lost_notice: bool,
}

/// Log-backed view for the headless client.
#[derive(Default)]
pub struct LogView {
  state: Mutex<LogViewState>,
}

impl LogView {
  pub fn new() -> Self {
    Self::default()
  }
}

impl FeedView for LogView {
  fn add_posts(&self, posts: &[Message]) {
    if posts.is_empty() {
      return;
    }

    for post in posts {
      let when = DateTime::from_timestamp_millis(post.time)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| post.time.to_string());
      let name = post.rest.get("name").and_then(|v| v.as_str()).unwrap_or("?");
      info!(id = %post.id, time = %when, name, "post");
    }

    let mut state = match self.state.lock() {
      Ok(state) => state,
      Err(poisoned) => poisoned.into_inner(),
    };
    state.showing = true;
    let newest = posts.iter().map(|p| p.time).max();
    state.latest = state.latest.max(newest);
  }

  fn showing_posts(&self) -> bool {
    self.state.lock().map(|s| s.showing).unwrap_or(false)
  }

  fn latest_post_date(&self) -> Option<i64> {
    self.state.lock().ok().and_then(|s| s.latest)
  }

  fn connection_lost(&self) {
    let mut state = match self.state.lock() {
      Ok(state) => state,
      Err(poisoned) => poisoned.into_inner(),
    };
    if !state.lost_notice {
      state.lost_notice = true;
      warn!("unable to connect, retrying");
    }
  }

  fn connection_restored(&self) {
    let mut state = match self.state.lock() {
      Ok(state) => state,
      Err(poisoned) => poisoned.into_inner(),
    };
    if state.lost_notice {
      state.lost_notice = false;
      info!("connection restored");
    }
  }
}
