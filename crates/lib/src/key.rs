//! Store key derivation and batch item construction.
//!
//! A store key is a local path made relative to a publishing root. The root is
//! normalized to end with exactly one `/`, so `/tmp/repo` and `/tmp/repo/`
//! both turn `/tmp/repo/org/a.jar` into `org/a.jar`. Paths outside the root are
//! used verbatim.

use std::path::{Path, PathBuf};

use crate::owners::ProductId;

/// Normalize `root` so it ends with a single `/`.
pub fn normalize_root(root: &str) -> String {
  format!("{}/", root.trim_end_matches('/'))
}

/// Derive the store key for `path` under `root`.
pub fn store_key(root: &str, path: &str) -> String {
  let root = normalize_root(root);
  match path.strip_prefix(root.as_str()) {
    Some(relative) => relative.to_string(),
    None => path.to_string(),
  }
}

/// One file of a batch, paired with its owner and store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
  pub local_path: PathBuf,
  pub product: Option<ProductId>,
  pub store_key: String,
}

impl UploadItem {
  pub fn new(local_path: impl Into<PathBuf>, product: Option<ProductId>, root: &str) -> Self {
    let local_path = local_path.into();
    let store_key = store_key(root, &local_path.to_string_lossy());
    Self {
      local_path,
      product,
      store_key,
    }
  }
}

/// Collect every regular file below `root`, sorted by path.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
  let mut files = Vec::new();
  for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
    let entry = entry?;
    if entry.file_type().is_file() {
      files.push(entry.into_path());
    }
  }
  Ok(files)
}
