use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use shelf_lib::digest::compute_digest;

use crate::output::{OutputFormat, print_json};

#[derive(Debug, Serialize)]
struct FileDigest<'a> {
  path: &'a Path,
  digest: String,
}

/// Print the digest `shelf upload` would record for each file.
pub fn cmd_digest(files: &[PathBuf], output: OutputFormat) -> Result<()> {
  let digests = files
    .iter()
    .map(|path| {
      let digest = compute_digest(path).with_context(|| format!("Failed to hash {}", path.display()))?;
      Ok(FileDigest {
        path: path.as_path(),
        digest,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  if output.is_json() {
    print_json(&digests)?;
  } else {
    for entry in &digests {
      println!("{}  {}", entry.digest, entry.path.display());
    }
  }

  Ok(())
}
