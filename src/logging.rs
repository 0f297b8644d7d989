// src/logging.rs

//! Logging setup for `livehls` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection:
//! 1. `--log-level` CLI flag, applied to livehls itself
//! 2. `LIVEHLS_LOG` environment variable, as a full `EnvFilter` directive
//!    (e.g. `"livehls=debug,reqwest=info"`)
//! 3. default to `info`
//!
//! HTTP client internals are capped at `warn` unless a directive says
//! otherwise. Logs go to STDERR so that stdout stays free for `--dry-run`
//! output.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Directives appended to every filter.
const QUIET_DEPENDENCIES: &[&str] = &["hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let base = match cli_level {
        Some(lvl) => format!("warn,livehls={}", level_name(lvl)),
        None => std::env::var("LIVEHLS_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string()),
    };

    let mut filter = EnvFilter::try_new(&base)
        .with_context(|| format!("invalid log filter '{base}'"))?;
    for directive in QUIET_DEPENDENCIES {
        if !base.contains(directive.split('=').next().unwrap_or_default()) {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
