mod assets;
mod cache;
mod config;
mod controller;
mod error;
mod feed;
mod images;
mod net;
mod store;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::assets::StaticAssets;
use crate::cache::{CacheNamespaces, FsCacheStore, MemoryCacheStore};
use crate::config::Config;
use crate::controller::Controller;
use crate::feed::{FeedView, Ingestor, LogView, TransportConfig};
use crate::images::ImageGateway;
use crate::net::{Fetch, HttpFetcher};
use crate::store::{MessageStore, NoopStore, RetentionPruner, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "wittr")]
#[command(about = "Offline-first client for the Wittr live message feed")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wittr/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Feed server origin, e.g. http://localhost:8888
  #[arg(short, long)]
  server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override server if specified on command line
  let config = if let Some(server) = args.server {
    Config { server, ..config }
  } else {
    config
  };

  let _log_guard = init_tracing(&config);

  // Both backends degrade rather than abort: the feed keeps working with
  // reduced offline capability.
  let store: Arc<dyn MessageStore> = match open_store(&config) {
    Ok(store) => Arc::new(store),
    Err(e) => {
      warn!(error = %e, "message store unavailable, continuing without persistence");
      Arc::new(NoopStore)
    }
  };
  let cache: Arc<dyn CacheNamespaces> = match open_cache(&config) {
    Ok(cache) => Arc::new(cache),
    Err(e) => {
      warn!(error = %e, "cache directory unavailable, caching in memory only");
      Arc::new(MemoryCacheStore::new())
    }
  };

  let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new()?);
  let base = config.base_url()?;

  let assets = StaticAssets::new(
    Arc::clone(&cache),
    Arc::clone(&fetcher),
    base.clone(),
    config.static_assets.version,
    config.static_assets.manifest.clone(),
  );
  if let Err(e) = assets.install().await {
    warn!(error = %e, "static cache install failed, offline shell unavailable");
  } else if let Err(e) = assets.activate().await {
    warn!(error = %e, "static cache activation failed");
  }

  let view: Arc<dyn FeedView> = Arc::new(LogView::new());
  let gateway = Arc::new(
    ImageGateway::new(Arc::clone(&cache), Arc::clone(&fetcher)).with_base(base),
  );
  let pruner = Arc::new(RetentionPruner::new(Arc::clone(&store), config.retention));
  let ingestor = Arc::new(
    Ingestor::new(Arc::clone(&store), pruner, Arc::clone(&view)).with_gateway(gateway),
  );
  let transport = TransportConfig {
    updates_url: config.updates_url()?,
    reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
  };

  Controller::new(store, cache, view, ingestor, transport).run().await;

  Ok(())
}

fn open_store(config: &Config) -> crate::error::Result<SqliteStore> {
  match &config.data_dir {
    Some(dir) => SqliteStore::open_at(&dir.join("feed.db")),
    None => SqliteStore::open(),
  }
}

fn open_cache(config: &Config) -> crate::error::Result<FsCacheStore> {
  match &config.cache_dir {
    Some(dir) => FsCacheStore::open(dir),
    None => FsCacheStore::open_default(),
  }
}

/// Logs go to stderr, or to a daily file when `log_dir` is configured. The
/// returned guard must outlive the session so buffered lines flush on exit.
fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  match &config.log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "wittr.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      None
    }
  }
}
