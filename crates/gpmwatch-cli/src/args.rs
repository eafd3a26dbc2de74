//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gpmwatch_core::backoff::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HANDSHAKE_TRIES};

use crate::tracker::paths;

/// Track and print mouse events from gpm.
///
/// Starts gpm-track on the given console, waits for its shared-memory
/// channel, then prints cursor moves and clicks, one per line.
#[derive(Debug, Parser)]
#[command(
    name = "gpmwatch",
    version,
    after_help = "\
Examples:
  gpmwatch tty3                         # Watch the mouse on /dev/tty3
  gpmwatch -i 0.2 tty3                  # Poll the position 5 times a second
  gpmwatch -s gpm-test tty3             # Use /dev/shm/gpm-test as the channel
  gpmwatch --format json tty3           # One JSON object per event
  RUST_LOG=debug gpmwatch tty3          # Log handshake progress to stderr"
)]
pub struct Cli {
    /// TTY name without /dev prefix (example: tty3, pts/4), or an absolute path
    pub tty: String,

    /// Interval between reading the x/y position
    #[arg(
        short,
        long,
        value_name = "SECONDS",
        default_value_t = 1.0,
        value_parser = parse_seconds
    )]
    pub interval: f64,

    /// /dev/shm name to pass to gpm-track (empty: do not pass)
    #[arg(short, long, value_name = "NAME", value_parser = parse_shm_name)]
    pub shm: Option<String>,

    /// Path to the compiled gpm-track binary
    #[arg(
        short = 'b',
        long,
        value_name = "PATH",
        default_value = "./gpm-track"
    )]
    pub gpm_track_binary: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Number of checks for the shared-memory channel at startup
    #[arg(long, value_name = "N", default_value_t = DEFAULT_HANDSHAKE_TRIES)]
    pub handshake_tries: usize,

    /// Time budget for the startup checks
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_HANDSHAKE_TIMEOUT,
        value_parser = parse_seconds
    )]
    pub handshake_timeout: f64,
}

impl Cli {
    /// Channel name to pass on, treating an empty `--shm` as absent.
    pub fn shm_name(&self) -> Option<&str> {
        self.shm.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `pos: (x, y)` and `click (single, left, (x, y))` lines
    Text,
    /// One JSON object per line
    Json,
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("'{}' must be greater than zero", value));
    }
    Ok(seconds)
}

fn parse_shm_name(value: &str) -> Result<String, String> {
    if value.is_empty() || paths::is_valid_shm_name(value) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "'{}' is not a valid shm name (use letters, digits, '-', '_' and '.')",
            value
        ))
    }
}
