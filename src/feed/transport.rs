//! Live-update websocket channel.
//!
//! The channel delivers JSON arrays of messages. On any close or connect
//! failure the client reconnects after a fixed delay — no backoff growth,
//! no retry cap — asking the server for posts newer than the latest one the
//! view already shows.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use super::ingest::Ingestor;
use super::view::FeedView;

/// Fixed reconnect delay used when the config does not override it.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct TransportConfig {
  /// Websocket endpoint, e.g. `ws://localhost:8888/updates`.
  pub updates_url: Url,
  pub reconnect_delay: Duration,
}

/// Connect URL for one attempt, carrying `since=<ms>` when the view already
/// shows posts.
fn socket_url(base: &Url, since: Option<i64>) -> Url {
  let mut url = base.clone();
  if let Some(since) = since {
    url.query_pairs_mut().append_pair("since", &since.to_string());
  }
  url
}

/// Run the channel until the process exits.
///
/// In-flight store operations are never cancelled by a close; the loop just
/// reconnects and newer batches overwrite by id.
pub async fn run(config: TransportConfig, ingestor: Arc<Ingestor>, view: Arc<dyn FeedView>) {
  loop {
    let url = socket_url(&config.updates_url, view.latest_post_date());

    match connect_async(url.as_str()).await {
      Ok((mut stream, _)) => {
        info!(url = %url, "live-update channel open");
        view.connection_restored();

        while let Some(frame) = stream.next().await {
          match frame {
            Ok(WsMessage::Text(text)) => {
              if let Err(e) = ingestor.on_batch(&text).await {
                warn!(error = %e, "batch dropped");
              }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
              debug!(error = %e, "live-update channel error");
              break;
            }
          }
        }

        view.connection_lost();
      }
      Err(e) => {
        debug!(url = %url, error = %e, "live-update connect failed");
        view.connection_lost();
      }
    }

    tokio::time::sleep(config.reconnect_delay).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_socket_url_without_history_has_no_since() {
    let base = Url::parse("ws://localhost:8888/updates").unwrap();
    assert_eq!(socket_url(&base, None).as_str(), "ws://localhost:8888/updates");
  }

  #[test]
  fn test_socket_url_carries_latest_post_date() {
    let base = Url::parse("ws://localhost:8888/updates").unwrap();
    let url = socket_url(&base, Some(1_457_000_000_000));
    assert_eq!(url.as_str(), "ws://localhost:8888/updates?since=1457000000000");
  }

  #[test]
  fn test_socket_url_does_not_accumulate_parameters() {
    let base = Url::parse("ws://localhost:8888/updates").unwrap();
    let first = socket_url(&base, Some(1));
    // The next attempt starts from the base again
    let second = socket_url(&base, Some(2));
    assert_eq!(first.query(), Some("since=1"));
    assert_eq!(second.query(), Some("since=2"));
  }
}
