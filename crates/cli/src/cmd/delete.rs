//! `shelf delete`: release a product's claim on stored files.
//!
//! Paths name store keys through the root and need not exist locally. Without
//! explicit paths the local root is walked, which releases everything a
//! previous `shelf upload` of the same tree published.

use std::time::Instant;

use anyhow::Result;
use tracing::info;

use super::{BatchArgs, GlobalOpts, finish_batch, open_manager, runtime};
use crate::output::print_warning;

pub fn cmd_delete(args: &BatchArgs, opts: &GlobalOpts) -> Result<()> {
  let start = Instant::now();
  let root = args.root_prefix();
  let paths = args.resolve_paths(&root)?;

  if args.product.is_none() && !opts.output.is_json() {
    print_warning("No --product given; stored objects will not be modified");
  }
  info!(root = %root, files = paths.len(), "releasing files");

  let rt = runtime()?;
  let report = rt.block_on(async {
    let manager = open_manager(opts).await?;
    anyhow::Ok(manager.delete_files(&paths, args.product.as_ref(), &root).await)
  })?;

  finish_batch("Delete", &report, start.elapsed(), opts)
}
