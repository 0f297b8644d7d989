// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The job runtime talks to a `ProcessBackend` instead of spawning processes
//! itself. This keeps the supervision logic testable: tests provide a backend
//! that records launches and lets the test inject progress / error / end
//! events, while production uses [`FfmpegBackend`].

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::supervisor::JobEvent;

use super::process_runner::run_segmenter;
use super::SegmenterCommand;

/// How a job launches and stops its segmenter.
///
/// A backend belongs to exactly one job and runs at most one process at a
/// time.
pub trait ProcessBackend: Send {
    /// Start a process for `command`. Its lifecycle must be reported on
    /// `events` as `JobEvent::Process(..)`, ending with exactly one `Error`
    /// or `End`.
    fn launch(&mut self, command: SegmenterCommand, events: mpsc::Sender<JobEvent>)
    -> Result<()>;

    /// Ask the running process to stop with [`super::TERMINATION_SIGNAL`].
    ///
    /// Returns immediately; the resulting exit arrives later as an event.
    fn terminate(&mut self);
}

/// Internal handle for the currently running segmenter.
struct ActiveProcess {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Real backend: runs the configured segmenter binary.
pub struct FfmpegBackend {
    job_id: String,
    active: Option<ActiveProcess>,
}

impl FfmpegBackend {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            active: None,
        }
    }
}

impl std::fmt::Debug for FfmpegBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegBackend")
            .field("job_id", &self.job_id)
            .field("running", &self.active.as_ref().is_some_and(|a| !a.handle.is_finished()))
            .finish()
    }
}

impl ProcessBackend for FfmpegBackend {
    fn launch(
        &mut self,
        command: SegmenterCommand,
        events: mpsc::Sender<JobEvent>,
    ) -> Result<()> {
        let still_running = self
            .active
            .as_ref()
            .is_some_and(|previous| !previous.handle.is_finished());
        if still_running {
            warn!(job = %self.job_id, "segmenter still running at relaunch; terminating it");
            self.terminate();
        }

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let job_id = self.job_id.clone();
        let handle = tokio::spawn(async move {
            run_segmenter(job_id, command, events, cancel_rx).await;
        });

        self.active = Some(ActiveProcess {
            cancel: Some(cancel_tx),
            handle,
        });
        Ok(())
    }

    fn terminate(&mut self) {
        let Some(active) = self.active.as_mut() else {
            debug!(job = %self.job_id, "terminate requested but no segmenter was launched");
            return;
        };

        match active.cancel.take() {
            Some(cancel) => {
                info!(job = %self.job_id, "terminating segmenter");
                if cancel.send(()).is_err() {
                    debug!(job = %self.job_id, "segmenter already finished while terminating");
                }
            }
            None => {
                debug!(job = %self.job_id, "segmenter termination already requested");
            }
        }
    }
}
