//! Object store bindings.
//!
//! The lifecycle protocol talks to a store through [`ObjectStore`]: a keyed
//! body + metadata store with whole-object replace, in-place metadata copy,
//! and optimistic preconditions. Three bindings ship with the crate:
//!
//! - [`memory::MemoryStore`]: in-process map, used by tests and embedders
//! - [`dir::DirStore`]: a local directory tree with JSON metadata sidecars
//! - [`s3::S3Store`]: any S3-compatible service via `aws-sdk-s3`
//!
//! [`Backend`] selects one of them at runtime from configuration.

pub mod dir;
pub mod memory;
pub mod s3;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{BackendKind, ConfigError, StoreConfig};
use crate::metadata::MetadataMap;

use dir::DirStore;
use memory::MemoryStore;
use s3::S3Store;

/// Opaque version of an object as observed by `head`.
///
/// `tag` is compared for equality by every binding. `modified_secs` and
/// `fingerprint` are only filled in by bindings whose tag does not change on
/// metadata-only updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionToken {
  pub tag: String,
  pub modified_secs: Option<i64>,
  /// Hash of the metadata map the probe returned.
  pub fingerprint: Option<String>,
}

impl VersionToken {
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      modified_secs: None,
      fingerprint: None,
    }
  }
}

/// Content handed to [`ObjectStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
  Bytes(Bytes),
  /// A local file, read or streamed by the binding when the write is sent.
  File(PathBuf),
}

impl ObjectBody {
  /// Load the whole body into memory.
  pub async fn into_bytes(self) -> io::Result<Bytes> {
    match self {
      Self::Bytes(bytes) => Ok(bytes),
      Self::File(path) => tokio::fs::read(&path).await.map(Bytes::from),
    }
  }
}

impl From<Bytes> for ObjectBody {
  fn from(bytes: Bytes) -> Self {
    Self::Bytes(bytes)
  }
}

/// Result of probing a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
  pub metadata: MetadataMap,
  pub version: VersionToken,
}

/// Condition a write must satisfy to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
  /// Apply unconditionally.
  None,
  /// Apply only if the key does not exist.
  IfAbsent,
  /// Apply only if the object is still at this version.
  IfMatch(VersionToken),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("object '{key}' changed since it was read")]
  PreconditionFailed { key: String },

  #[error("invalid store key '{key}'")]
  InvalidKey { key: String },

  #[error("{op} failed for key '{key}': {message}")]
  Backend {
    op: &'static str,
    key: String,
    message: String,
  },

  #[error("corrupt metadata for key '{key}': {source}")]
  CorruptMetadata {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("IO error: {0}")]
  Io(#[from] io::Error),
}

/// A bucket-bound object store.
///
/// Implementations must be safe to call concurrently; the manager issues
/// requests for distinct keys in parallel.
pub trait ObjectStore: Send + Sync + 'static {
  /// Probe a key. `Ok(None)` means the object does not exist.
  fn head(&self, key: &str) -> impl Future<Output = Result<Option<ObjectHead>, StoreError>> + Send;

  /// Write body and metadata, replacing any existing object.
  fn put(
    &self,
    key: &str,
    body: ObjectBody,
    metadata: MetadataMap,
    precondition: Precondition,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// Replace an existing object's metadata without rewriting its body.
  fn copy_metadata(
    &self,
    key: &str,
    metadata: MetadataMap,
    precondition: Precondition,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// Remove an object. Deleting a missing key is not an error.
  fn delete(&self, key: &str, precondition: Precondition) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// All keys, optionally restricted to `prefix`, following pagination.
  fn list(&self, prefix: Option<&str>) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// A store binding chosen at runtime.
pub enum Backend {
  Memory(MemoryStore),
  Dir(DirStore),
  S3(S3Store),
}

impl Backend {
  /// Open the configured backend.
  ///
  /// `bucket` overrides the configured default bucket for S3; `dir` forces the
  /// directory backend rooted there.
  pub async fn open(config: &StoreConfig, bucket: Option<&str>, dir: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(dir) = dir {
      debug!(path = %dir.display(), "opening directory store");
      return Ok(Self::Dir(DirStore::new(dir)));
    }

    match config.backend {
      BackendKind::Dir => {
        let path = config.path.as_deref().ok_or(ConfigError::MissingDirPath)?;
        debug!(path = %path.display(), "opening directory store");
        Ok(Self::Dir(DirStore::new(path)))
      }
      BackendKind::S3 => {
        let bucket = bucket
          .filter(|b| !b.trim().is_empty())
          .or(config.bucket.as_deref())
          .ok_or(ConfigError::MissingBucket)?;
        debug!(bucket = %bucket, "opening S3 store");
        Ok(Self::S3(S3Store::connect(config, bucket).await))
      }
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Memory(_) => "memory",
      Self::Dir(store) => store.root().to_str().unwrap_or("dir"),
      Self::S3(store) => store.bucket(),
    }
  }
}

impl ObjectStore for Backend {
  async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
    match self {
      Self::Memory(store) => store.head(key).await,
      Self::Dir(store) => store.head(key).await,
      Self::S3(store) => store.head(key).await,
    }
  }

  async fn put(&self, key: &str, body: ObjectBody, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    match self {
      Self::Memory(store) => store.put(key, body, metadata, precondition).await,
      Self::Dir(store) => store.put(key, body, metadata, precondition).await,
      Self::S3(store) => store.put(key, body, metadata, precondition).await,
    }
  }

  async fn copy_metadata(&self, key: &str, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    match self {
      Self::Memory(store) => store.copy_metadata(key, metadata, precondition).await,
      Self::Dir(store) => store.copy_metadata(key, metadata, precondition).await,
      Self::S3(store) => store.copy_metadata(key, metadata, precondition).await,
    }
  }

  async fn delete(&self, key: &str, precondition: Precondition) -> Result<(), StoreError> {
    match self {
      Self::Memory(store) => store.delete(key, precondition).await,
      Self::Dir(store) => store.delete(key, precondition).await,
      Self::S3(store) => store.delete(key, precondition).await,
    }
  }

  async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
    match self {
      Self::Memory(store) => store.list(prefix).await,
      Self::Dir(store) => store.list(prefix).await,
      Self::S3(store) => store.list(prefix).await,
    }
  }
}
