//! Local directory object store.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── objects/<key>        # object bodies, one file per key
//! ├── meta/<key>.json      # Sidecar: metadata map + version
//! └── tmp/                 # staging area for atomic writes
//! ```
//!
//! A body without a sidecar (a file copied in by hand) is an object with empty
//! metadata. Writers inside one process are serialized; other processes
//! writing the same tree are not coordinated. Filesystem work runs on tokio's
//! blocking pool.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::{ObjectBody, ObjectHead, ObjectStore, Precondition, StoreError, VersionToken};
use crate::metadata::MetadataMap;

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const TMP_DIR: &str = "tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
  version: u64,
  metadata: MetadataMap,
}

/// Directory store handle. Cheap to clone; clones share the same tree.
#[derive(Debug, Clone)]
pub struct DirStore {
  tree: Arc<DirTree>,
}

/// Synchronous filesystem side of [`DirStore`], run on the blocking pool.
#[derive(Debug)]
struct DirTree {
  root: PathBuf,
  write_lock: Mutex<()>,
  tmp_counter: AtomicU64,
}

impl DirStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      tree: Arc::new(DirTree {
        root: root.into(),
        write_lock: Mutex::new(()),
        tmp_counter: AtomicU64::new(0),
      }),
    }
  }

  pub fn root(&self) -> &Path {
    &self.tree.root
  }

  /// Run `f` against the tree without blocking an async worker.
  async fn blocking<T, F>(&self, op: &'static str, key: &str, f: F) -> Result<T, StoreError>
  where
    T: Send + 'static,
    F: FnOnce(&DirTree) -> Result<T, StoreError> + Send + 'static,
  {
    let tree = Arc::clone(&self.tree);
    tokio::task::spawn_blocking(move || f(&tree))
      .await
      .map_err(|e| StoreError::Backend {
        op,
        key: key.to_string(),
        message: e.to_string(),
      })?
  }
}

impl DirTree {
  fn objects_dir(&self) -> PathBuf {
    self.root.join(OBJECTS_DIR)
  }

  fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
    Ok(self.objects_dir().join(validate_key(key)?))
  }

  fn sidecar_path(&self, key: &str) -> Result<PathBuf, StoreError> {
    let mut name = OsString::from(validate_key(key)?);
    name.push(".json");
    Ok(self.root.join(META_DIR).join(name))
  }

  /// Current version and metadata, or `None` if the key has no body.
  fn read_state(&self, key: &str) -> Result<Option<Sidecar>, StoreError> {
    if !self.object_path(key)?.is_file() {
      return Ok(None);
    }

    match fs::read(self.sidecar_path(key)?) {
      Ok(content) => serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| StoreError::CorruptMetadata {
          key: key.to_string(),
          source,
        }),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Some(Sidecar::default())),
      Err(e) => Err(e.into()),
    }
  }

  fn lock(&self) -> MutexGuard<'_, ()> {
    self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Stage `body` in a temp file and rename it onto `path`.
  fn write_atomic(&self, path: &Path, body: &ObjectBody) -> io::Result<()> {
    let tmp_dir = self.root.join(TMP_DIR);
    fs::create_dir_all(&tmp_dir)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
    let temp_path = tmp_dir.join(format!("{}-{}", std::process::id(), n));
    match body {
      ObjectBody::Bytes(bytes) => fs::write(&temp_path, bytes)?,
      ObjectBody::File(source) => {
        fs::copy(source, &temp_path)?;
      }
    }
    fs::rename(&temp_path, path)
  }

  fn write_sidecar(&self, key: &str, sidecar: &Sidecar) -> Result<(), StoreError> {
    let content = serde_json::to_vec_pretty(sidecar).map_err(|source| StoreError::CorruptMetadata {
      key: key.to_string(),
      source,
    })?;
    self.write_atomic(&self.sidecar_path(key)?, &ObjectBody::Bytes(Bytes::from(content)))?;
    Ok(())
  }

  /// Remove empty directories between `path` and `stop`.
  fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
      if dir == stop || fs::remove_dir(dir).is_err() {
        break;
      }
      current = dir.parent();
    }
  }

  fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
    Ok(self.read_state(key)?.map(|state| ObjectHead {
      metadata: state.metadata,
      version: VersionToken::new(state.version.to_string()),
    }))
  }

  fn put(&self, key: &str, body: &ObjectBody, metadata: MetadataMap, precondition: &Precondition) -> Result<(), StoreError> {
    let _guard = self.lock();
    let current = self.read_state(key)?;
    check(key, current.as_ref(), precondition)?;

    let sidecar = Sidecar {
      version: next_version(current.as_ref()),
      metadata,
    };
    self.write_atomic(&self.object_path(key)?, body)?;
    self.write_sidecar(key, &sidecar)?;
    debug!(key = %key, "wrote object");
    Ok(())
  }

  fn copy_metadata(&self, key: &str, metadata: MetadataMap, precondition: &Precondition) -> Result<(), StoreError> {
    let _guard = self.lock();
    let current = self.read_state(key)?;
    check(key, current.as_ref(), precondition)?;

    let Some(current) = current else {
      return Err(StoreError::Backend {
        op: "copy_metadata",
        key: key.to_string(),
        message: "no such key".to_string(),
      });
    };

    let sidecar = Sidecar {
      version: next_version(Some(&current)),
      metadata,
    };
    self.write_sidecar(key, &sidecar)?;
    debug!(key = %key, "replaced object metadata");
    Ok(())
  }

  fn delete(&self, key: &str, precondition: &Precondition) -> Result<(), StoreError> {
    let _guard = self.lock();
    let current = self.read_state(key)?;
    check(key, current.as_ref(), precondition)?;

    if current.is_none() {
      return Ok(());
    }

    let object_path = self.object_path(key)?;
    let sidecar_path = self.sidecar_path(key)?;
    fs::remove_file(&object_path)?;
    match fs::remove_file(&sidecar_path) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
    Self::prune_empty_parents(&object_path, &self.objects_dir());
    Self::prune_empty_parents(&sidecar_path, &self.root.join(META_DIR));
    debug!(key = %key, "deleted object");
    Ok(())
  }

  fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
    let objects = self.objects_dir();
    if !objects.exists() {
      return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(&objects).sort_by_file_name() {
      let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e)))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let Ok(relative) = entry.path().strip_prefix(&objects) else {
        continue;
      };
      let key = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      if key.starts_with(prefix) {
        keys.push(key);
      }
    }
    keys.sort();
    Ok(keys)
  }
}

fn validate_key(key: &str) -> Result<&Path, StoreError> {
  let path = Path::new(key);
  let valid = !key.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
  if valid {
    Ok(path)
  } else {
    Err(StoreError::InvalidKey { key: key.to_string() })
  }
}

fn check(key: &str, current: Option<&Sidecar>, precondition: &Precondition) -> Result<(), StoreError> {
  let satisfied = match (precondition, current) {
    (Precondition::None, _) => true,
    (Precondition::IfAbsent, None) => true,
    (Precondition::IfMatch(token), Some(state)) => token.tag == state.version.to_string(),
    _ => false,
  };

  if satisfied {
    Ok(())
  } else {
    Err(StoreError::PreconditionFailed { key: key.to_string() })
  }
}

/// Next version: strictly increasing per key and unlikely to repeat after a
/// delete and re-create.
fn next_version(previous: Option<&Sidecar>) -> u64 {
  let now = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_nanos() as u64)
    .unwrap_or_default();
  let floor = previous.map(|s| s.version + 1).unwrap_or(1);
  now.max(floor)
}

impl ObjectStore for DirStore {
  async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
    let owned = key.to_string();
    self.blocking("head", key, move |tree| tree.head(&owned)).await
  }

  async fn put(&self, key: &str, body: ObjectBody, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    let owned = key.to_string();
    self
      .blocking("put", key, move |tree| tree.put(&owned, &body, metadata, &precondition))
      .await
  }

  async fn copy_metadata(&self, key: &str, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    let owned = key.to_string();
    self
      .blocking("copy_metadata", key, move |tree| tree.copy_metadata(&owned, metadata, &precondition))
      .await
  }

  async fn delete(&self, key: &str, precondition: Precondition) -> Result<(), StoreError> {
    let owned = key.to_string();
    self
      .blocking("delete", key, move |tree| tree.delete(&owned, &precondition))
      .await
  }

  async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
    let prefix = prefix.unwrap_or("").to_string();
    self.blocking("list", "", move |tree| tree.list(&prefix)).await
  }
}
