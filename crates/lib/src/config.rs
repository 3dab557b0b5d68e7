//! Configuration for the object manager and its store binding.
//!
//! Loaded from TOML. Resolution order for the file:
//! 1. an explicit path (`--config`)
//! 2. `$SHELF_CONFIG`
//! 3. `<config_dir>/shelf/config.toml`, if it exists
//!
//! Without any file every setting takes its default.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CONFIG_ENV_VAR, CONFIG_FILENAME, DEFAULT_CONFLICT_RETRIES, DEFAULT_PARALLELISM, DEFAULT_REGION,
  DEFAULT_RETRY_MAX_ATTEMPTS,
};
use crate::platform::paths::config_dir;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("no bucket given and no default bucket configured (store.bucket)")]
  MissingBucket,

  #[error("directory backend selected but store.path is not set")]
  MissingDirPath,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  #[default]
  S3,
  Dir,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
  #[default]
  Standard,
  Adaptive,
}

/// Store binding settings (`[store]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub backend: BackendKind,
  /// Default bucket when a command does not name one.
  pub bucket: Option<String>,
  pub region: String,
  /// Custom endpoint for S3-compatible services.
  pub endpoint_url: Option<String>,
  pub force_path_style: bool,
  pub access_key_id: Option<String>,
  pub secret_access_key: Option<String>,
  pub retry_max_attempts: u32,
  pub retry_mode: RetryMode,
  /// Root of the directory backend.
  pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      backend: BackendKind::default(),
      bucket: None,
      region: DEFAULT_REGION.to_string(),
      endpoint_url: None,
      force_path_style: false,
      access_key_id: None,
      secret_access_key: None,
      retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
      retry_mode: RetryMode::default(),
      path: None,
    }
  }
}

/// Object manager settings (`[manager]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
  /// Maximum number of items processed concurrently within a batch.
  pub parallelism: usize,
  /// Extra attempts after a write loses an optimistic-concurrency race.
  pub conflict_retries: u32,
}

impl Default for ManagerConfig {
  fn default() -> Self {
    Self {
      parallelism: DEFAULT_PARALLELISM,
      conflict_retries: DEFAULT_CONFLICT_RETRIES,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
  pub store: StoreConfig,
  pub manager: ManagerConfig,
}

impl ShelfConfig {
  /// Load a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Default config file location.
  pub fn default_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILENAME))
  }

  /// Resolve and load the config file.
  ///
  /// An explicit or environment-provided path must exist; the default location
  /// is optional.
  pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      debug!(path = %path.display(), "loading config");
      return Self::load(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
      && !path.trim().is_empty()
    {
      debug!(path = %path, "loading config from {}", CONFIG_ENV_VAR);
      return Self::load(Path::new(&path));
    }

    match Self::default_path() {
      Some(path) if path.is_file() => {
        debug!(path = %path.display(), "loading config");
        Self::load(&path)
      }
      _ => {
        debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }
}
