//! Pure decision functions of the object lifecycle protocol.
//!
//! Each function looks at what the store currently holds for a key and at what
//! the caller brings, and returns the single store [`Action`] to perform. None
//! of them touch the store, so every branch of the protocol can be exercised
//! without a live backend. The manager pairs the chosen action with a version
//! precondition and re-runs the decision when that precondition fails.

use crate::metadata::ObjectMetadata;
use crate::owners::ProductId;

/// What to do with a store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Write the body together with `metadata` (create or full replace).
  Put { metadata: ObjectMetadata },
  /// Replace the metadata in place, leaving the body untouched.
  UpdateMetadata { metadata: ObjectMetadata },
  /// Remove the object.
  Delete,
  /// Leave the store as it is.
  Skip,
}

/// Stored content disagrees with the local file under the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestConflict {
  pub stored: String,
  pub local: String,
}

/// Content upload: the body is written once and its digest is immutable.
///
/// A missing object is created with the local digest and the product as sole
/// owner. An existing object is never rewritten: a differing digest is a
/// conflict, otherwise the product is appended to the owner set if absent.
pub fn plan_upload(
  existing: Option<&ObjectMetadata>,
  digest: &str,
  product: Option<&ProductId>,
) -> Result<Action, DigestConflict> {
  let Some(existing) = existing else {
    let mut metadata = ObjectMetadata::default();
    if !digest.is_empty() {
      metadata.digest = Some(digest.to_string());
    }
    if let Some(product) = product {
      metadata.owners.insert(product.clone());
    }
    return Ok(Action::Put { metadata });
  };

  if let Some(stored) = existing.digest()
    && !digest.is_empty()
    && stored != digest
  {
    return Err(DigestConflict {
      stored: stored.to_string(),
      local: digest.to_string(),
    });
  }

  let Some(product) = product else {
    return Ok(Action::Skip);
  };

  let mut metadata = existing.clone();
  if metadata.owners.insert(product.clone()) {
    Ok(Action::UpdateMetadata { metadata })
  } else {
    Ok(Action::Skip)
  }
}

/// Metadata-file upload: the content is expected to change on every publish.
///
/// The digest is refreshed unconditionally and the product merged in. The body
/// is rewritten only when the object is missing or its digest changed;
/// otherwise the merged metadata is written in place.
pub fn plan_metadata_upload(existing: Option<&ObjectMetadata>, digest: &str, product: Option<&ProductId>) -> Action {
  let needs_body_rewrite = match existing {
    None => true,
    Some(existing) => existing.digest() != Some(digest),
  };

  let mut metadata = existing.cloned().unwrap_or_default();
  metadata.digest = Some(digest.to_string());
  if let Some(product) = product {
    metadata.owners.insert(product.clone());
  }

  if needs_body_rewrite {
    Action::Put { metadata }
  } else {
    Action::UpdateMetadata { metadata }
  }
}

/// Release: drop `product`'s claim and delete the object with its last owner.
///
/// Only a removal performed by this call can lead to a delete. A product that
/// was never an owner, or a call without a product, leaves the object alone
/// even if its owner set is already empty.
pub fn plan_release(existing: Option<&ObjectMetadata>, product: Option<&ProductId>) -> Action {
  let (Some(existing), Some(product)) = (existing, product) else {
    return Action::Skip;
  };

  let mut metadata = existing.clone();
  if !metadata.owners.remove(product) {
    return Action::Skip;
  }

  if metadata.owners.is_empty() {
    Action::Delete
  } else {
    Action::UpdateMetadata { metadata }
  }
}
