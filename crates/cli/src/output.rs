//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output: colored status
//! messages, per-item outcome lines and human-readable durations.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use shelf_lib::Outcome;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ADD: &str = "+";
  pub const MODIFY: &str = "~";
  pub const REMOVE: &str = "-";
  pub const SAME: &str = "=";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One line per processed item: `<symbol> <key> (<outcome>)`.
pub fn print_outcome(key: &str, outcome: Outcome) {
  let detail = format!("({})", outcome.as_str());
  let detail = detail.if_supports_color(Stream::Stdout, |s| s.dimmed());
  match outcome {
    Outcome::Created | Outcome::Rewritten => println!(
      "  {} {} {}",
      symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
      key,
      detail
    ),
    Outcome::OwnerAdded | Outcome::MetadataUpdated | Outcome::Released => println!(
      "  {} {} {}",
      symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()),
      key,
      detail
    ),
    Outcome::Deleted => println!(
      "  {} {} {}",
      symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
      key,
      detail
    ),
    Outcome::Unchanged | Outcome::Absent => println!(
      "  {} {} {}",
      symbols::SAME.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      key,
      detail
    ),
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
