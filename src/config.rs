use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::feed::transport::DEFAULT_RECONNECT_DELAY;
use crate::store::prune::DEFAULT_RETENTION;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Feed server origin, e.g. `http://localhost:8888`.
  pub server: String,
  /// Retention window: newest messages kept by the pruner.
  pub retention: usize,
  /// Fixed delay before reconnecting the live-update channel.
  pub reconnect_delay_ms: u64,
  /// Override for the message database directory.
  pub data_dir: Option<PathBuf>,
  /// Override for the cache namespace root.
  pub cache_dir: Option<PathBuf>,
  /// When set, logs go to a daily file here instead of stderr.
  pub log_dir: Option<PathBuf>,
  pub static_assets: StaticAssetsConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      server: "http://localhost:8888".to_string(),
      retention: DEFAULT_RETENTION,
      reconnect_delay_ms: DEFAULT_RECONNECT_DELAY.as_millis() as u64,
      data_dir: None,
      cache_dir: None,
      log_dir: None,
      static_assets: StaticAssetsConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticAssetsConfig {
  /// Version of the static cache snapshot. Bumping it supersedes the
  /// previous snapshot on activation.
  pub version: u32,
  /// Fixed asset list cached wholesale on install.
  pub manifest: Vec<String>,
}

impl Default for StaticAssetsConfig {
  fn default() -> Self {
    Self {
      version: 16,
      manifest: vec![
        "/skeleton".to_string(),
        "js/main.js".to_string(),
        "css/main.css".to_string(),
        "imgs/icon.png".to_string(),
      ],
    }
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wittr.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wittr/config.yaml
  ///
  /// With no file anywhere, the defaults above apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("wittr.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wittr").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Server origin as a URL.
  pub fn base_url(&self) -> Result<Url> {
    Url::parse(&self.server).map_err(|e| eyre!("Invalid server URL {}: {}", self.server, e))
  }

  /// Websocket endpoint for the live-update channel.
  pub fn updates_url(&self) -> Result<Url> {
    let mut url = self.base_url()?.join("/updates")?;
    let scheme = match url.scheme() {
      "https" | "wss" => "wss",
      _ => "ws",
    };
    url
      .set_scheme(scheme)
      .map_err(|_| eyre!("Cannot derive websocket scheme for {}", self.server))?;
    Ok(url)
  }
}
