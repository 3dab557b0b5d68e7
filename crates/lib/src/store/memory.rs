//! In-process object store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::{ObjectBody, ObjectHead, ObjectStore, Precondition, StoreError, VersionToken};
use crate::metadata::MetadataMap;

/// Number of store calls served, by kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCounts {
  pub heads: usize,
  pub puts: usize,
  pub metadata_updates: usize,
  pub deletes: usize,
}

impl OpCounts {
  /// Calls that changed the store.
  pub fn writes(&self) -> usize {
    self.puts + self.metadata_updates + self.deletes
  }
}

#[derive(Debug, Clone)]
struct Entry {
  body: Bytes,
  metadata: MetadataMap,
  version: u64,
}

#[derive(Debug, Default)]
struct Inner {
  objects: BTreeMap<String, Entry>,
  next_version: u64,
  ops: OpCounts,
}

impl Inner {
  fn bump(&mut self) -> u64 {
    self.next_version += 1;
    self.next_version
  }
}

/// Thread-safe in-memory store with monotonic versions.
///
/// Versions are never reused, even across delete and re-create, so a stale
/// token can never match a newer object.
#[derive(Debug, Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Seed an object without counting it as a store call.
  pub fn insert(&self, key: &str, body: impl Into<Bytes>, metadata: MetadataMap) {
    let mut inner = self.lock();
    let version = inner.bump();
    inner.objects.insert(
      key.to_string(),
      Entry {
        body: body.into(),
        metadata,
        version,
      },
    );
  }

  pub fn ops(&self) -> OpCounts {
    self.lock().ops
  }

  pub fn contains(&self, key: &str) -> bool {
    self.lock().objects.contains_key(key)
  }

  pub fn body(&self, key: &str) -> Option<Bytes> {
    self.lock().objects.get(key).map(|e| e.body.clone())
  }

  pub fn metadata(&self, key: &str) -> Option<MetadataMap> {
    self.lock().objects.get(key).map(|e| e.metadata.clone())
  }

  pub fn len(&self) -> usize {
    self.lock().objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn check(key: &str, current: Option<&Entry>, precondition: &Precondition) -> Result<(), StoreError> {
  let satisfied = match (precondition, current) {
    (Precondition::None, _) => true,
    (Precondition::IfAbsent, None) => true,
    (Precondition::IfMatch(token), Some(entry)) => token.tag == entry.version.to_string(),
    _ => false,
  };

  if satisfied {
    Ok(())
  } else {
    Err(StoreError::PreconditionFailed { key: key.to_string() })
  }
}

impl ObjectStore for MemoryStore {
  async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
    let mut inner = self.lock();
    inner.ops.heads += 1;
    Ok(inner.objects.get(key).map(|entry| ObjectHead {
      metadata: entry.metadata.clone(),
      version: VersionToken::new(entry.version.to_string()),
    }))
  }

  async fn put(&self, key: &str, body: ObjectBody, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    let body = body.into_bytes().await?;
    let mut inner = self.lock();
    check(key, inner.objects.get(key), &precondition)?;
    let version = inner.bump();
    inner.ops.puts += 1;
    inner.objects.insert(key.to_string(), Entry { body, metadata, version });
    Ok(())
  }

  async fn copy_metadata(&self, key: &str, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    let mut inner = self.lock();
    check(key, inner.objects.get(key), &precondition)?;
    let version = inner.bump();
    inner.ops.metadata_updates += 1;
    match inner.objects.get_mut(key) {
      Some(entry) => {
        entry.metadata = metadata;
        entry.version = version;
        Ok(())
      }
      None => Err(StoreError::Backend {
        op: "copy_metadata",
        key: key.to_string(),
        message: "no such key".to_string(),
      }),
    }
  }

  async fn delete(&self, key: &str, precondition: Precondition) -> Result<(), StoreError> {
    let mut inner = self.lock();
    check(key, inner.objects.get(key), &precondition)?;
    inner.ops.deletes += 1;
    inner.objects.remove(key);
    Ok(())
  }

  async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
    let inner = self.lock();
    let prefix = prefix.unwrap_or("");
    Ok(
      inner
        .objects
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}
