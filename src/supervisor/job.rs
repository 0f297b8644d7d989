// src/supervisor/job.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;
use crate::exec::SegmenterCommand;
use crate::manifest::MANIFEST_FILE;
use crate::types::JobStatus;

/// What the caller supplies to create a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub id: String,
    pub source_url: String,
    /// Receives the one-time start notification, if set.
    pub callback_url: Option<String>,
}

/// One supervised stream.
///
/// Identity and paths are fixed at creation; the mutable fields are only
/// touched by the job's own core state machine.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub source_url: String,
    pub callback_url: Option<String>,
    pub output_folder: PathBuf,
    pub manifest_path: PathBuf,
    pub config: Arc<Config>,

    pub status: JobStatus,
    pub process_started: bool,
    /// A segmenter was launched and its exit has not been seen yet.
    pub process_running: bool,
    /// The job asked the running segmenter to terminate.
    pub termination_requested: bool,
    pub marked_as_stopped: bool,
    /// A terminal notification (end or error) has been emitted.
    pub marked_as_ended: bool,
    pub marked_as_finished: bool,
    pub init_error_count: u32,
    pub process_error_count: u32,
    pub live_delay: Duration,
    pub started_at: Option<Instant>,
}

impl Job {
    pub fn new(spec: JobSpec, config: Arc<Config>) -> Self {
        let output_folder = config.output.base_path.join(&spec.id);
        let manifest_path = output_folder.join(MANIFEST_FILE);

        Self {
            id: spec.id,
            source_url: spec.source_url,
            callback_url: spec.callback_url,
            output_folder,
            manifest_path,
            config,
            status: JobStatus::Initialized,
            process_started: false,
            process_running: false,
            termination_requested: false,
            marked_as_stopped: false,
            marked_as_ended: false,
            marked_as_finished: false,
            init_error_count: 0,
            process_error_count: 0,
            live_delay: Duration::ZERO,
            started_at: None,
        }
    }

    /// Public URL the CDN serves this job's manifest under.
    pub fn stream_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.control_plane.cdn_base_url.trim_end_matches('/'),
            self.id,
            MANIFEST_FILE
        )
    }

    /// Control-plane status endpoint for this job.
    pub fn status_url(&self) -> String {
        format!(
            "{}/broadcasts/{}",
            self.config.control_plane.base_url.trim_end_matches('/'),
            self.id
        )
    }

    /// Build the segmenter invocation from the job's current parameters.
    pub fn segmenter_command(&self) -> SegmenterCommand {
        let segmenter = &self.config.segmenter;
        SegmenterCommand {
            program: segmenter.program.clone(),
            source_url: self.source_url.clone(),
            user_agent: segmenter.user_agent.clone(),
            segment_duration: segmenter.segment_duration,
            max_segment_window: segmenter.max_segment_window,
            output_dir: self.output_folder.clone(),
            manifest_path: self.manifest_path.clone(),
        }
    }

    pub fn report(&self) -> JobReport {
        JobReport {
            id: self.id.clone(),
            status: self.status,
            init_error_count: self.init_error_count,
            process_error_count: self.process_error_count,
            live_delay: self.live_delay,
            output_folder: self.output_folder.clone(),
        }
    }
}

/// Final state of a job once its runtime has wound down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub id: String,
    pub status: JobStatus,
    pub init_error_count: u32,
    pub process_error_count: u32,
    pub live_delay: Duration,
    pub output_folder: PathBuf,
}
