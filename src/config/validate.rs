// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{Config, RawConfig, RetrySection, RetrySettings};
use crate::errors::{LivehlsError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = LivehlsError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let retry = resolve_retry(&raw.retry)?;
        Ok(Config::new_unchecked(
            raw.output,
            raw.segmenter,
            raw.control_plane,
            retry,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_segmenter(cfg)?;
    validate_control_plane(cfg)?;
    validate_retry_caps(cfg)?;
    Ok(())
}

fn validate_segmenter(cfg: &RawConfig) -> Result<()> {
    if cfg.segmenter.segment_duration == 0 {
        return Err(LivehlsError::ConfigError(
            "[segmenter].segment_duration must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.segmenter.max_segment_window == 0 {
        return Err(LivehlsError::ConfigError(
            "[segmenter].max_segment_window must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.segmenter.program.trim().is_empty() {
        return Err(LivehlsError::ConfigError(
            "[segmenter].program must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_control_plane(cfg: &RawConfig) -> Result<()> {
    for (key, value) in [
        ("base_url", &cfg.control_plane.base_url),
        ("cdn_base_url", &cfg.control_plane.cdn_base_url),
    ] {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err(LivehlsError::ConfigError(format!(
                "[control_plane].{key} must be an http(s) URL (got '{value}')"
            )));
        }
    }
    Ok(())
}

fn validate_retry_caps(cfg: &RawConfig) -> Result<()> {
    if cfg.retry.max_init_attempts == 0 {
        return Err(LivehlsError::ConfigError(
            "[retry].max_init_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.retry.max_process_attempts == 0 {
        return Err(LivehlsError::ConfigError(
            "[retry].max_process_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn resolve_retry(retry: &RetrySection) -> Result<RetrySettings> {
    let field = |key: &str, value: &str| {
        parse_duration(value)
            .map_err(|e| LivehlsError::ConfigError(format!("[retry].{key}: {e}")))
    };

    Ok(RetrySettings {
        max_init_attempts: retry.max_init_attempts,
        init_interval: field("init_interval", &retry.init_interval)?,
        max_process_attempts: retry.max_process_attempts,
        process_interval: field("process_interval", &retry.process_interval)?,
        status_poll_default_delay: field(
            "status_poll_default_delay",
            &retry.status_poll_default_delay,
        )?,
        http_timeout: field("http_timeout", &retry.http_timeout)?,
    })
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
