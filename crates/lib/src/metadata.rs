//! Typed view over an object's metadata map.

use std::collections::BTreeMap;

use crate::consts::{CHECKSUM_META_KEY, PRODUCT_META_KEY};
use crate::owners::OwnerSet;

/// Raw per-object metadata as exchanged with a store binding.
pub type MetadataMap = BTreeMap<String, String>;

/// The reserved metadata fields of a stored object.
///
/// Keys other than `checksum` and `rh-products` are carried in `extra` and
/// written back untouched on every metadata-only update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
  pub digest: Option<String>,
  pub owners: OwnerSet,
  pub extra: MetadataMap,
}

impl ObjectMetadata {
  pub fn from_map(map: &MetadataMap) -> Self {
    let mut extra = map.clone();
    let digest = extra
      .remove(CHECKSUM_META_KEY)
      .map(|d| d.trim().to_string())
      .filter(|d| !d.is_empty());
    let owners = extra
      .remove(PRODUCT_META_KEY)
      .map(|wire| OwnerSet::parse(&wire))
      .unwrap_or_default();

    Self { digest, owners, extra }
  }

  /// Encode back to a metadata map. Empty fields are omitted.
  pub fn to_map(&self) -> MetadataMap {
    let mut map = self.extra.clone();
    if let Some(digest) = self.digest() {
      map.insert(CHECKSUM_META_KEY.to_string(), digest.to_string());
    }
    if !self.owners.is_empty() {
      map.insert(PRODUCT_META_KEY.to_string(), self.owners.to_wire());
    }
    map
  }

  /// The recorded digest, if any. Blank digests count as unrecorded.
  pub fn digest(&self) -> Option<&str> {
    self.digest.as_deref().filter(|d| !d.is_empty())
  }
}
