//! Subcommand implementations and the plumbing they share.

mod delete;
mod digest;
mod list;
mod upload;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use shelf_lib::key::collect_files;
use shelf_lib::store::Backend;
use shelf_lib::{BatchReport, ObjectManager, Outcome, ProductId, ShelfConfig};

use crate::output::{OutputFormat, format_duration, print_error, print_json, print_outcome, print_stat, print_success, print_warning};

pub use delete::cmd_delete;
pub use digest::cmd_digest;
pub use list::cmd_list;
pub use upload::{cmd_upload, cmd_upload_metadata};

/// Flags accepted by every subcommand.
pub struct GlobalOpts {
  pub config: Option<PathBuf>,
  pub bucket: Option<String>,
  pub store_dir: Option<PathBuf>,
  pub output: OutputFormat,
  pub verbose: bool,
}

/// Arguments of the batch subcommands.
#[derive(Args, Debug)]
pub struct BatchArgs {
  /// Product that owns the files
  #[arg(short, long)]
  pub product: Option<ProductId>,

  /// Publishing root; store keys are paths relative to it
  #[arg(short, long)]
  pub root: PathBuf,

  /// Files to process, relative to the root or absolute (default: every file below the root)
  pub paths: Vec<PathBuf>,
}

impl BatchArgs {
  /// The root as a canonical string.
  pub fn root_prefix(&self) -> String {
    canonicalize_lenient(&self.root).to_string_lossy().into_owned()
  }

  /// Explicit paths resolved against the root, or every file below it.
  pub fn resolve_paths(&self, root: &str) -> Result<Vec<PathBuf>> {
    let root = Path::new(root);
    if self.paths.is_empty() {
      debug!(root = %root.display(), "walking root");
      return collect_files(root).with_context(|| format!("Failed to walk {}", root.display()));
    }

    Ok(
      self
        .paths
        .iter()
        .map(|path| {
          if path.is_absolute() {
            canonicalize_lenient(path)
          } else {
            root.join(path)
          }
        })
        .collect(),
    )
  }
}

/// Canonicalize `path` even when its tail no longer exists.
///
/// The longest existing ancestor is resolved and the missing components are
/// appended, so a file deleted below a symlinked root still maps to the key it
/// was uploaded under.
fn canonicalize_lenient(path: &Path) -> PathBuf {
  let mut existing = path;
  let mut missing = Vec::new();
  loop {
    if let Ok(canonical) = dunce::canonicalize(existing) {
      return missing.iter().rev().fold(canonical, |acc, name| acc.join(name));
    }
    match (existing.parent(), existing.file_name()) {
      (Some(parent), Some(name)) => {
        missing.push(name);
        existing = parent;
      }
      _ => return path.to_path_buf(),
    }
  }
}

/// Load the config and open the store the flags point at.
pub async fn open_manager(opts: &GlobalOpts) -> Result<ObjectManager<Backend>> {
  let config = ShelfConfig::discover(opts.config.as_deref()).context("Failed to load config")?;
  let backend = Backend::open(&config.store, opts.bucket.as_deref(), opts.store_dir.as_deref())
    .await
    .context("Failed to open store")?;
  debug!(store = backend.name(), "store ready");
  Ok(ObjectManager::with_config(backend, config.manager))
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Print a batch report and fail when any item failed.
pub fn finish_batch(verb: &str, report: &BatchReport, elapsed: Duration, opts: &GlobalOpts) -> Result<()> {
  if opts.output.is_json() {
    print_json(report)?;
  } else {
    for item in &report.succeeded {
      if opts.verbose || !matches!(item.outcome, Outcome::Unchanged | Outcome::Absent) {
        print_outcome(&item.key, item.outcome);
      }
    }
    for failure in &report.failed {
      print_error(&failure.message);
    }

    println!();
    if report.is_success() {
      print_success(&format!("{} complete", verb));
    } else {
      print_warning(&format!("{} finished with failures", verb));
    }
    print_stat("Processed", &report.total().to_string());
    print_stat("Succeeded", &report.succeeded.len().to_string());
    print_stat("Failed", &report.failed.len().to_string());
    print_stat("Duration", &format_duration(elapsed));
  }

  if !report.is_success() {
    bail!("{} of {} item(s) failed", report.failed.len(), report.total());
  }
  Ok(())
}
