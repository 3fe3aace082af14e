//! Network fetch capability.
//!
//! The gateway and asset installer never talk to reqwest directly; they hold
//! a `dyn Fetch` so tests can inject a scripted fetcher and count calls.

use async_trait::async_trait;
use std::time::Duration;

use crate::cache::Snapshot;
use crate::error::{Error, Result};

/// Fetches a URL and materializes the full response.
#[async_trait]
pub trait Fetch: Send + Sync {
  async fn fetch(&self, url: &str) -> Result<Snapshot>;
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("wittr/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| Error::TransientNetworkFailure {
        url: String::new(),
        reason: format!("build http client: {}", e),
      })?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Fetch for HttpFetcher {
  async fn fetch(&self, url: &str) -> Result<Snapshot> {
    let failed = |e: reqwest::Error| Error::TransientNetworkFailure {
      url: url.to_string(),
      reason: e.to_string(),
    };

    let response = self.client.get(url).send().await.map_err(failed)?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await.map_err(failed)?.to_vec();

    Ok(Snapshot { status, headers, body })
  }
}
