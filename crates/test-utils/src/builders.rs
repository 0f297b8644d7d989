#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use livehls::config::{
    Config, ControlPlaneSection, OutputSection, RawConfig, RetrySection, SegmenterSection,
};
use livehls::fs::FileSystem;
use livehls::http::HttpBackend;
use livehls::manifest::CannedManifests;
use livehls::supervisor::{JobServices, JobSpec};

pub const CONTROL_PLANE: &str = "http://control.test";
pub const CDN: &str = "http://cdn.test";
pub const SOURCE: &str = "http://origin.test/live/stream.m3u8";
pub const CALLBACK: &str = "http://caller.test/started";

/// Builder for `Config` to simplify test setup.
///
/// Defaults keep every wait short: 1s segments, 1s retry intervals.
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            raw: RawConfig {
                output: OutputSection {
                    base_path: base_path.as_ref().to_path_buf(),
                },
                segmenter: SegmenterSection {
                    segment_duration: 1,
                    ..SegmenterSection::default()
                },
                control_plane: ControlPlaneSection {
                    base_url: CONTROL_PLANE.to_string(),
                    cdn_base_url: CDN.to_string(),
                },
                retry: RetrySection {
                    init_interval: "1s".to_string(),
                    process_interval: "1s".to_string(),
                    ..RetrySection::default()
                },
            },
        }
    }

    pub fn segment_duration(mut self, secs: u64) -> Self {
        self.raw.segmenter.segment_duration = secs;
        self
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.raw.segmenter.program = program.into();
        self
    }

    pub fn max_init_attempts(mut self, n: u32) -> Self {
        self.raw.retry.max_init_attempts = n;
        self
    }

    pub fn init_interval(mut self, d: &str) -> Self {
        self.raw.retry.init_interval = d.to_string();
        self
    }

    pub fn max_process_attempts(mut self, n: u32) -> Self {
        self.raw.retry.max_process_attempts = n;
        self
    }

    pub fn process_interval(mut self, d: &str) -> Self {
        self.raw.retry.process_interval = d.to_string();
        self
    }

    pub fn status_poll_default_delay(mut self, d: &str) -> Self {
        self.raw.retry.status_poll_default_delay = d.to_string();
        self
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw).expect("Failed to build valid config from builder")
    }

    pub fn build_arc(self) -> Arc<Config> {
        Arc::new(self.build())
    }
}

/// Spec for job `id` against the test source, without a callback.
pub fn job_spec(id: &str) -> JobSpec {
    JobSpec {
        id: id.to_string(),
        source_url: SOURCE.to_string(),
        callback_url: None,
    }
}

pub fn job_spec_with_callback(id: &str) -> JobSpec {
    JobSpec {
        callback_url: Some(CALLBACK.to_string()),
        ..job_spec(id)
    }
}

/// Services over the given fakes, with the built-in substitute manifests.
pub fn services(fs: Arc<dyn FileSystem>, http: Arc<dyn HttpBackend>) -> JobServices {
    JobServices {
        fs,
        http,
        canned: Arc::new(CannedManifests::builtin()),
    }
}

pub fn status_url(id: &str) -> String {
    format!("{CONTROL_PLANE}/broadcasts/{id}")
}

pub fn manifest_path(base: &Path, id: &str) -> PathBuf {
    base.join(id).join("master.m3u8")
}
