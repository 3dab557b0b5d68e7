//! Per-item failures of a batch operation.
//!
//! Every variant names the offending path or store key and the product the
//! batch was run for, so a driver can report which file failed for whom.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::owners::{ProductId, product_label};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ItemError {
  /// The source file did not exist when the item was processed.
  #[error("file {} does not exist (product: {})", .path.display(), product_label(.product))]
  LocalFileMissing { path: PathBuf, product: Option<ProductId> },

  /// The source file exists but could not be read.
  #[error("failed to read {} (product: {}): {source}", .path.display(), product_label(.product))]
  ReadLocal {
    path: PathBuf,
    product: Option<ProductId>,
    #[source]
    source: io::Error,
  },

  /// The stored object's digest differs from the local content.
  #[error(
    "checksum mismatch for {key} (product: {}): stored {stored}, local {local}",
    product_label(.product)
  )]
  ChecksumConflict {
    key: String,
    product: Option<ProductId>,
    stored: String,
    local: String,
  },

  /// The store binding failed.
  #[error("store failure for {key} (product: {}): {source}", product_label(.product))]
  StoreUnavailable {
    key: String,
    product: Option<ProductId>,
    #[source]
    source: StoreError,
  },

  /// Every attempt lost a race with a concurrent writer of the same key.
  #[error(
    "{key} kept changing concurrently, gave up after {attempts} attempts (product: {})",
    product_label(.product)
  )]
  ConcurrentModification {
    key: String,
    product: Option<ProductId>,
    attempts: u32,
  },

  /// The worker processing the item stopped before reporting.
  #[error("processing of {key} was aborted (product: {}): {message}", product_label(.product))]
  Aborted {
    key: String,
    product: Option<ProductId>,
    message: String,
  },
}

/// Serializable classification of an [`ItemError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  LocalFileMissing,
  ReadLocal,
  ChecksumConflict,
  StoreUnavailable,
  ConcurrentModification,
  Aborted,
}

impl ItemError {
  pub fn kind(&self) -> FailureKind {
    match self {
      Self::LocalFileMissing { .. } => FailureKind::LocalFileMissing,
      Self::ReadLocal { .. } => FailureKind::ReadLocal,
      Self::ChecksumConflict { .. } => FailureKind::ChecksumConflict,
      Self::StoreUnavailable { .. } => FailureKind::StoreUnavailable,
      Self::ConcurrentModification { .. } => FailureKind::ConcurrentModification,
      Self::Aborted { .. } => FailureKind::Aborted,
    }
  }

  pub fn product(&self) -> Option<&ProductId> {
    match self {
      Self::LocalFileMissing { product, .. }
      | Self::ReadLocal { product, .. }
      | Self::ChecksumConflict { product, .. }
      | Self::StoreUnavailable { product, .. }
      | Self::ConcurrentModification { product, .. }
      | Self::Aborted { product, .. } => product.as_ref(),
    }
  }
}
