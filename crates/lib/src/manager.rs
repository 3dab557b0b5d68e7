//! Ownership-aware object manager.
//!
//! The manager turns batches of local paths into store keys, probes the store,
//! asks the [`protocol`](crate::protocol) functions what to do and executes the
//! answer under a version precondition. A lost race re-runs the probe and the
//! decision. How tightly a precondition is enforced depends on the binding:
//! the memory and directory stores reject every stale write, the S3 binding
//! leaves the narrow windows described in [`store::s3`](crate::store::s3).
//!
//! Items of a batch run concurrently, bounded by `parallelism`. One item's
//! failure is recorded in the report and never stops the others.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::digest::compute_digest;
use crate::error::ItemError;
use crate::key::UploadItem;
use crate::metadata::ObjectMetadata;
use crate::owners::{ProductId, product_label};
use crate::protocol::{Action, plan_metadata_upload, plan_release, plan_upload};
use crate::report::{BatchReport, ItemFailure, ItemReport, Outcome};
use crate::store::{ObjectBody, ObjectHead, ObjectStore, Precondition, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
  Content,
  Metadata,
  Release,
}

/// Local content of an upload item, hashed once before the first probe.
///
/// The body itself is only handed to the store when a write needs it.
struct Payload {
  path: PathBuf,
  digest: String,
}

pub struct ObjectManager<S> {
  store: Arc<S>,
  config: ManagerConfig,
}

impl<S> Clone for ObjectManager<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      config: self.config,
    }
  }
}

impl<S: ObjectStore> ObjectManager<S> {
  pub fn new(store: S) -> Self {
    Self::with_config(store, ManagerConfig::default())
  }

  pub fn with_config(store: S, config: ManagerConfig) -> Self {
    Self::from_arc(Arc::new(store), config)
  }

  /// Share an existing store handle.
  pub fn from_arc(store: Arc<S>, config: ManagerConfig) -> Self {
    Self { store, config }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn config(&self) -> &ManagerConfig {
    &self.config
  }

  /// Upload content files.
  ///
  /// New keys are created with the local digest and `product` as owner.
  /// Existing keys are never rewritten: a different digest fails the item with
  /// [`ItemError::ChecksumConflict`], otherwise `product` is added to the
  /// owners when missing.
  pub async fn upload_files(&self, paths: &[PathBuf], product: Option<&ProductId>, root: &str) -> BatchReport {
    self.run_batch(paths, product, root, Protocol::Content).await
  }

  /// Upload metadata files whose content is expected to change.
  ///
  /// The stored digest always follows the local file. The body is rewritten
  /// when the digest changed, otherwise only the merged metadata is written.
  pub async fn upload_metadata(&self, paths: &[PathBuf], product: Option<&ProductId>, root: &str) -> BatchReport {
    self.run_batch(paths, product, root, Protocol::Metadata).await
  }

  /// Release `product`'s claim on each path, deleting objects left without
  /// owners. The paths need not exist locally.
  pub async fn delete_files(&self, paths: &[PathBuf], product: Option<&ProductId>, root: &str) -> BatchReport {
    self.run_batch(paths, product, root, Protocol::Release).await
  }

  /// List stored keys. Blank filters are ignored; the suffix is matched
  /// against the end of each key.
  pub async fn get_files(&self, prefix: Option<&str>, suffix: Option<&str>) -> Result<Vec<String>, StoreError> {
    let prefix = prefix.filter(|p| !p.trim().is_empty());
    let suffix = suffix.filter(|s| !s.trim().is_empty());

    let keys = self.store.list(prefix).await?;
    debug!(count = keys.len(), prefix = ?prefix, "listed keys");

    Ok(match suffix {
      Some(suffix) => keys.into_iter().filter(|key| key.ends_with(suffix)).collect(),
      None => keys,
    })
  }

  async fn run_batch(
    &self,
    paths: &[PathBuf],
    product: Option<&ProductId>,
    root: &str,
    protocol: Protocol,
  ) -> BatchReport {
    let items: Vec<UploadItem> = paths
      .iter()
      .map(|path| UploadItem::new(path.clone(), product.cloned(), root))
      .collect();

    info!(
      items = items.len(),
      product = product.map(ProductId::as_str).unwrap_or("<none>"),
      protocol = ?protocol,
      "starting batch"
    );

    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
    let mut join_set = JoinSet::new();

    for (index, item) in items.iter().enumerate() {
      let item = item.clone();
      let store = Arc::clone(&self.store);
      let semaphore = Arc::clone(&semaphore);
      let retries = self.config.conflict_retries;

      join_set.spawn(async move {
        let _permit = semaphore.acquire().await.ok();
        let result = process_item(store.as_ref(), &item, protocol, retries).await;
        (index, result)
      });
    }

    let mut results: Vec<Option<Result<Outcome, ItemError>>> = items.iter().map(|_| None).collect();
    let mut abort_message = None;

    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok((index, result)) => results[index] = Some(result),
        Err(e) => {
          error!(error = %e, "batch task failed");
          abort_message = Some(e.to_string());
        }
      }
    }

    let mut report = BatchReport::default();
    for (item, result) in items.into_iter().zip(results) {
      let result = result.unwrap_or_else(|| {
        Err(ItemError::Aborted {
          key: item.store_key.clone(),
          product: item.product.clone(),
          message: abort_message.clone().unwrap_or_else(|| "task did not complete".to_string()),
        })
      });

      match result {
        Ok(outcome) => report.succeeded.push(ItemReport {
          path: item.local_path,
          key: item.store_key,
          outcome,
        }),
        Err(e) => report.failed.push(ItemFailure::new(item.local_path, item.store_key, &e)),
      }
    }

    info!(
      succeeded = report.succeeded.len(),
      failed = report.failed.len(),
      "batch complete"
    );

    report
  }
}

async fn process_item<S: ObjectStore>(
  store: &S,
  item: &UploadItem,
  protocol: Protocol,
  conflict_retries: u32,
) -> Result<Outcome, ItemError> {
  let payload = match protocol {
    Protocol::Content | Protocol::Metadata => Some(read_payload(item).await?),
    Protocol::Release => None,
  };

  let key = item.store_key.as_str();
  let attempts = conflict_retries.saturating_add(1);

  for attempt in 1..=attempts {
    let head = store.head(key).await.map_err(|source| store_failure(item, source))?;
    debug!(key = %key, attempt, exists = head.is_some(), "probed");

    let existing = head.as_ref().map(|h| ObjectMetadata::from_map(&h.metadata));
    let action = decide(item, protocol, existing.as_ref(), payload.as_ref())?;
    let precondition = precondition_for(head.as_ref());

    let applied = match &action {
      Action::Put { metadata } => {
        let body = match &payload {
          Some(payload) => ObjectBody::File(payload.path.clone()),
          None => ObjectBody::Bytes(Default::default()),
        };
        store.put(key, body, metadata.to_map(), precondition).await
      }
      Action::UpdateMetadata { metadata } => store.copy_metadata(key, metadata.to_map(), precondition).await,
      Action::Delete => store.delete(key, precondition).await,
      Action::Skip => Ok(()),
    };

    match applied {
      Ok(()) => {
        let outcome = outcome_of(protocol, &action, head.is_some());
        info!(key = %key, product = product_label(&item.product), outcome = ?outcome, "processed");
        return Ok(outcome);
      }
      Err(StoreError::PreconditionFailed { .. }) => {
        debug!(key = %key, attempt, "object changed concurrently, re-reading");
      }
      Err(source) => return Err(store_failure(item, source)),
    }
  }

  warn!(key = %key, attempts, "giving up after repeated concurrent modifications");
  Err(ItemError::ConcurrentModification {
    key: item.store_key.clone(),
    product: item.product.clone(),
    attempts,
  })
}

async fn read_payload(item: &UploadItem) -> Result<Payload, ItemError> {
  let is_file = tokio::fs::metadata(&item.local_path)
    .await
    .map(|m| m.is_file())
    .unwrap_or(false);

  if !is_file {
    warn!(
      path = %item.local_path.display(),
      product = product_label(&item.product),
      "file does not exist, skipping"
    );
    return Err(ItemError::LocalFileMissing {
      path: item.local_path.clone(),
      product: item.product.clone(),
    });
  }

  let path = item.local_path.clone();
  let digest = tokio::task::spawn_blocking(move || compute_digest(&path))
    .await
    .unwrap_or_else(|e| Err(io::Error::other(e)))
    .map_err(|source| ItemError::ReadLocal {
      path: item.local_path.clone(),
      product: item.product.clone(),
      source,
    })?;
  debug!(path = %item.local_path.display(), digest = %digest, "hashed local file");

  Ok(Payload {
    path: item.local_path.clone(),
    digest,
  })
}

fn decide(
  item: &UploadItem,
  protocol: Protocol,
  existing: Option<&ObjectMetadata>,
  payload: Option<&Payload>,
) -> Result<Action, ItemError> {
  let product = item.product.as_ref();
  let digest = payload.map(|p| p.digest.as_str()).unwrap_or_default();

  match protocol {
    Protocol::Content => plan_upload(existing, digest, product).map_err(|conflict| {
      warn!(
        key = %item.store_key,
        stored = %conflict.stored,
        local = %conflict.local,
        "checksum mismatch, refusing to overwrite"
      );
      ItemError::ChecksumConflict {
        key: item.store_key.clone(),
        product: item.product.clone(),
        stored: conflict.stored,
        local: conflict.local,
      }
    }),
    Protocol::Metadata => Ok(plan_metadata_upload(existing, digest, product)),
    Protocol::Release => Ok(plan_release(existing, product)),
  }
}

fn precondition_for(head: Option<&ObjectHead>) -> Precondition {
  match head {
    Some(head) => Precondition::IfMatch(head.version.clone()),
    None => Precondition::IfAbsent,
  }
}

fn outcome_of(protocol: Protocol, action: &Action, existed: bool) -> Outcome {
  match (protocol, action) {
    (Protocol::Release, _) if !existed => Outcome::Absent,
    (_, Action::Skip) => Outcome::Unchanged,
    (_, Action::Delete) => Outcome::Deleted,
    (Protocol::Release, Action::UpdateMetadata { .. }) => Outcome::Released,
    (Protocol::Metadata, Action::UpdateMetadata { .. }) => Outcome::MetadataUpdated,
    (_, Action::UpdateMetadata { .. }) => Outcome::OwnerAdded,
    (_, Action::Put { .. }) if existed => Outcome::Rewritten,
    (_, Action::Put { .. }) => Outcome::Created,
  }
}

fn store_failure(item: &UploadItem, source: StoreError) -> ItemError {
  error!(key = %item.store_key, error = %source, "store call failed");
  ItemError::StoreUnavailable {
    key: item.store_key.clone(),
    product: item.product.clone(),
    source,
  }
}
