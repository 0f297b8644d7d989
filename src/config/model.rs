// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration exactly as read from a TOML file.
///
/// ```toml
/// [output]
/// base_path = "/var/lib/livehls"
///
/// [segmenter]
/// segment_duration = 2
/// max_segment_window = 6
///
/// [control_plane]
/// base_url = "https://api.example.com"
/// cdn_base_url = "https://cdn.example.com"
///
/// [retry]
/// max_init_attempts = 80
/// init_interval = "3s"
/// ```
///
/// `[output]` and `[control_plane]` are required; the rest have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub output: OutputSection,

    #[serde(default)]
    pub segmenter: SegmenterSection,

    pub control_plane: ControlPlaneSection,

    #[serde(default)]
    pub retry: RetrySection,
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Directory under which every job gets `<base>/<id>/`, and where the
    /// shared `private/` and `deleted/` manifests live.
    pub base_path: PathBuf,
}

/// `[segmenter]` section: how the external segmenting process is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterSection {
    #[serde(default = "default_program")]
    pub program: String,

    /// Target segment length in seconds.
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u64,

    /// Maximum number of segments listed in the live manifest.
    #[serde(default = "default_max_segment_window")]
    pub max_segment_window: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_program() -> String {
    "ffmpeg".to_string()
}

fn default_segment_duration() -> u64 {
    2
}

fn default_max_segment_window() -> u32 {
    6
}

fn default_user_agent() -> String {
    concat!("livehls/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for SegmenterSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            segment_duration: default_segment_duration(),
            max_segment_window: default_max_segment_window(),
            user_agent: default_user_agent(),
        }
    }
}

/// `[control_plane]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneSection {
    /// Base URL of the control plane; status lives at `<base>/broadcasts/<id>`.
    pub base_url: String,

    /// Base URL under which the CDN serves `<id>/master.m3u8`.
    pub cdn_base_url: String,
}

/// `[retry]` section. Durations are strings such as `"3s"` or `"250ms"`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_init_attempts")]
    pub max_init_attempts: u32,

    #[serde(default = "default_interval")]
    pub init_interval: String,

    #[serde(default = "default_max_process_attempts")]
    pub max_process_attempts: u32,

    #[serde(default = "default_interval")]
    pub process_interval: String,

    #[serde(default = "default_status_poll_delay")]
    pub status_poll_default_delay: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout: String,
}

fn default_max_init_attempts() -> u32 {
    80
}

fn default_max_process_attempts() -> u32 {
    10
}

fn default_interval() -> String {
    "3s".to_string()
}

fn default_status_poll_delay() -> String {
    "10s".to_string()
}

fn default_http_timeout() -> String {
    "10s".to_string()
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_init_attempts: default_max_init_attempts(),
            init_interval: default_interval(),
            max_process_attempts: default_max_process_attempts(),
            process_interval: default_interval(),
            status_poll_default_delay: default_status_poll_delay(),
            http_timeout: default_http_timeout(),
        }
    }
}

/// Retry and pacing knobs with durations already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_init_attempts: u32,
    pub init_interval: Duration,
    pub max_process_attempts: u32,
    pub process_interval: Duration,
    pub status_poll_default_delay: Duration,
    pub http_timeout: Duration,
}

/// Validated configuration.
///
/// Construct it through `Config::try_from(RawConfig)` (see `validate.rs`) or
/// [`crate::config::load_and_validate`]; it is immutable once built and is
/// shared by every job the process supervises.
#[derive(Debug, Clone)]
pub struct Config {
    pub output: OutputSection,
    pub segmenter: SegmenterSection,
    pub control_plane: ControlPlaneSection,
    pub retry: RetrySettings,
}

impl Config {
    pub(crate) fn new_unchecked(
        output: OutputSection,
        segmenter: SegmenterSection,
        control_plane: ControlPlaneSection,
        retry: RetrySettings,
    ) -> Self {
        Self {
            output,
            segmenter,
            control_plane,
            retry,
        }
    }

    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(self.segmenter.segment_duration)
    }
}
