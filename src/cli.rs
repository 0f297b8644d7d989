// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `livehls`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "livehls",
    version,
    about = "Supervise a live stream segmenting job and keep its manifest in sync.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "livehls.toml")]
    pub config: String,

    /// Job identifier; output goes to `<base_path>/<ID>/`.
    #[arg(long, value_name = "ID")]
    pub id: String,

    /// Source stream URL handed to the segmenter.
    #[arg(long, value_name = "URL")]
    pub source: String,

    /// URL notified once the stream starts producing segments.
    #[arg(long, value_name = "URL")]
    pub callback: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LIVEHLS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the job and segmenter command, but run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Remove the job's output directory once the job has ended.
    #[arg(long)]
    pub cleanup: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
