use anyhow::{Context, Result};

use super::{GlobalOpts, open_manager, runtime};
use crate::output::{print_info, print_json};

pub fn cmd_list(prefix: Option<&str>, suffix: Option<&str>, opts: &GlobalOpts) -> Result<()> {
  let rt = runtime()?;
  let keys = rt.block_on(async {
    let manager = open_manager(opts).await?;
    manager.get_files(prefix, suffix).await.context("Failed to list keys")
  })?;

  if opts.output.is_json() {
    print_json(&keys)?;
  } else if keys.is_empty() {
    print_info("No matching keys");
  } else {
    for key in &keys {
      println!("{}", key);
    }
  }

  Ok(())
}
