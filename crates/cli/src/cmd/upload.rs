//! `shelf upload` and `shelf upload-metadata`.

use std::time::Instant;

use anyhow::Result;
use tracing::info;

use super::{BatchArgs, GlobalOpts, finish_batch, open_manager, runtime};

pub fn cmd_upload(args: &BatchArgs, opts: &GlobalOpts) -> Result<()> {
  let start = Instant::now();
  let root = args.root_prefix();
  let paths = args.resolve_paths(&root)?;
  info!(root = %root, files = paths.len(), "uploading content files");

  let rt = runtime()?;
  let report = rt.block_on(async {
    let manager = open_manager(opts).await?;
    anyhow::Ok(manager.upload_files(&paths, args.product.as_ref(), &root).await)
  })?;

  finish_batch("Upload", &report, start.elapsed(), opts)
}

pub fn cmd_upload_metadata(args: &BatchArgs, opts: &GlobalOpts) -> Result<()> {
  let start = Instant::now();
  let root = args.root_prefix();
  let paths = args.resolve_paths(&root)?;
  info!(root = %root, files = paths.len(), "uploading metadata files");

  let rt = runtime()?;
  let report = rt.block_on(async {
    let manager = open_manager(opts).await?;
    anyhow::Ok(manager.upload_metadata(&paths, args.product.as_ref(), &root).await)
  })?;

  finish_batch("Metadata upload", &report, start.elapsed(), opts)
}
