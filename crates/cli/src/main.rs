mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BatchArgs, GlobalOpts};
use output::OutputFormat;

/// shelf - publish files shared by several products into one object store
#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Config file (default: $SHELF_CONFIG, then <config dir>/shelf/config.toml)
  #[arg(long, global = true, value_name = "PATH")]
  config: Option<PathBuf>,

  /// Target bucket (default: store.bucket from the config file)
  #[arg(long, global = true)]
  bucket: Option<String>,

  /// Use a local directory as the store instead of the configured backend
  #[arg(long, global = true, value_name = "DIR")]
  store_dir: Option<PathBuf>,

  /// Output format
  #[arg(short = 'o', long, global = true, value_enum, default_value = "text")]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Upload content files, adding the product as an owner
  Upload(BatchArgs),

  /// Upload metadata files, rewriting them when their content changed
  UploadMetadata(BatchArgs),

  /// Release the product's claim, deleting objects left without owners
  Delete(BatchArgs),

  /// List stored keys
  List {
    /// Only keys starting with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Only keys ending with this suffix
    #[arg(long)]
    suffix: Option<String>,
  },

  /// Print the content digest recorded for files
  Digest {
    /// Files to hash
    #[arg(required = true)]
    files: Vec<PathBuf>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let opts = GlobalOpts {
    config: cli.config,
    bucket: cli.bucket,
    store_dir: cli.store_dir,
    output: cli.output,
    verbose: cli.verbose,
  };

  match cli.command {
    Commands::Upload(args) => cmd::cmd_upload(&args, &opts),
    Commands::UploadMetadata(args) => cmd::cmd_upload_metadata(&args, &opts),
    Commands::Delete(args) => cmd::cmd_delete(&args, &opts),
    Commands::List { prefix, suffix } => cmd::cmd_list(prefix.as_deref(), suffix.as_deref(), &opts),
    Commands::Digest { files } => cmd::cmd_digest(&files, opts.output),
  }
}
