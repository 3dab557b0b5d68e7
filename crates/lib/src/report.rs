//! Batch outcome reporting.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{FailureKind, ItemError};
use crate::owners::ProductId;

/// What happened to one successfully processed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  /// New object written.
  Created,
  /// Existing body replaced (metadata files only).
  Rewritten,
  /// Product appended to an existing object's owners.
  OwnerAdded,
  /// Metadata refreshed in place (metadata files only).
  MetadataUpdated,
  /// Product removed, other owners keep the object alive.
  Released,
  /// Last owner removed, object deleted.
  Deleted,
  /// Object already in the requested state.
  Unchanged,
  /// Nothing stored under the key.
  Absent,
}

impl Outcome {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::Rewritten => "rewritten",
      Self::OwnerAdded => "owner added",
      Self::MetadataUpdated => "metadata updated",
      Self::Released => "released",
      Self::Deleted => "deleted",
      Self::Unchanged => "unchanged",
      Self::Absent => "absent",
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
  pub path: PathBuf,
  pub key: String,
  pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
  pub path: PathBuf,
  pub key: String,
  pub product: Option<ProductId>,
  pub kind: FailureKind,
  pub message: String,
}

impl ItemFailure {
  pub fn new(path: PathBuf, key: String, error: &ItemError) -> Self {
    Self {
      path,
      key,
      product: error.product().cloned(),
      kind: error.kind(),
      message: error.to_string(),
    }
  }
}

/// Per-item results of a batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
  pub succeeded: Vec<ItemReport>,
  pub failed: Vec<ItemFailure>,
}

impl BatchReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn total(&self) -> usize {
    self.succeeded.len() + self.failed.len()
  }

  pub fn count(&self, outcome: Outcome) -> usize {
    self.succeeded.iter().filter(|r| r.outcome == outcome).count()
  }

  pub fn outcome_of(&self, key: &str) -> Option<Outcome> {
    self.succeeded.iter().find(|r| r.key == key).map(|r| r.outcome)
  }

  pub fn failure_of(&self, key: &str) -> Option<&ItemFailure> {
    self.failed.iter().find(|f| f.key == key)
  }
}
