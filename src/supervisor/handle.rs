// src/supervisor/handle.rs

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{LivehlsError, Result};
use crate::exec::ProcessBackend;
use crate::fs::FileSystem;
use crate::http::HttpBackend;
use crate::manifest::CannedManifests;
use crate::types::JobNotification;

use super::core::JobCore;
use super::runtime::JobRuntime;
use super::{JobEvent, JobReport, JobSpec};

/// Shared collaborators a job runs against.
#[derive(Clone)]
pub struct JobServices {
    pub fs: Arc<dyn FileSystem>,
    pub http: Arc<dyn HttpBackend>,
    pub canned: Arc<CannedManifests>,
}

impl fmt::Debug for JobServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobServices")
            .field("fs", &self.fs)
            .field("canned", &self.canned)
            .finish_non_exhaustive()
    }
}

/// Create a job and spawn its runtime. Nothing happens until
/// [`JobHandle::start`] is called.
pub fn spawn_job<P>(
    spec: JobSpec,
    config: Arc<Config>,
    services: JobServices,
    process: P,
) -> JobHandle
where
    P: ProcessBackend + 'static,
{
    let id = spec.id.clone();
    let (event_tx, event_rx) = mpsc::channel::<JobEvent>(64);
    let (notify_tx, notify_rx) = mpsc::unbounded_channel::<JobNotification>();
    let cancel = CancellationToken::new();

    let core = JobCore::new(spec, config);
    let runtime = JobRuntime::new(
        core,
        event_rx,
        event_tx.downgrade(),
        notify_tx,
        cancel.clone(),
        services,
        process,
    );
    let join = tokio::spawn(runtime.run());

    JobHandle {
        id,
        event_tx,
        cancel,
        notifications: Some(notify_rx),
        join,
    }
}

/// The caller's side of a running job.
///
/// Notifications (`End`, `Error`, `Warning`) arrive on the receiver from
/// [`JobHandle::take_notifications`]; exactly one terminal notification is
/// ever sent. Dropping the handle (and every [`StopHandle`]) abandons the
/// job once its in-flight work completes.
pub struct JobHandle {
    id: String,
    event_tx: mpsc::Sender<JobEvent>,
    cancel: CancellationToken,
    notifications: Option<mpsc::UnboundedReceiver<JobNotification>>,
    join: JoinHandle<JobReport>,
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.join.is_finished())
            .finish_non_exhaustive()
    }
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Begin verifying the source; the job starts itself once it is
    /// reachable.
    ///
    /// Starting a job that was already stopped does nothing.
    pub async fn start(&self) -> Result<()> {
        if self.is_stopped() {
            debug!(job = %self.id, "job stopped before start; not starting");
            return Ok(());
        }
        match self.send(JobEvent::StartRequested { at: Instant::now() }).await {
            Err(LivehlsError::JobGone(_)) if self.is_stopped() => {
                debug!(job = %self.id, "job stopped while starting");
                Ok(())
            }
            result => result,
        }
    }

    /// True once [`JobHandle::stop`] or a [`StopHandle`] stopped the job.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the job. See [`StopHandle::stop`].
    pub async fn stop(&self) -> Result<()> {
        self.stop_handle().stop().await
    }

    /// A cloneable handle that can only stop this job, for use from signal
    /// handlers while another task waits on the job.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            id: self.id.clone(),
            event_tx: self.event_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Record that the stream is expected to end on its own.
    pub async fn mark_as_finished(&self) -> Result<()> {
        self.send(JobEvent::MarkAsFinished).await
    }

    /// Take the notification receiver. Returns `None` after the first call.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<JobNotification>> {
        self.notifications.take()
    }

    /// Wait for the job runtime to wind down: a terminal notification has
    /// been sent and the segmenter, if any, has exited.
    ///
    /// Only call this on a started (or stopped) job; an idle job never ends.
    pub async fn wait(self) -> Result<JobReport> {
        let JobHandle {
            id,
            event_tx: _event_tx,
            join,
            ..
        } = self;
        join.await
            .with_context(|| format!("job runtime for '{id}' panicked"))
            .map_err(LivehlsError::from)
    }

    async fn send(&self, event: JobEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| LivehlsError::JobGone(self.id.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct StopHandle {
    id: String,
    event_tx: mpsc::Sender<JobEvent>,
    cancel: CancellationToken,
}

impl StopHandle {
    /// Stop the job.
    ///
    /// The job's cancellation token is set before this returns, so pending
    /// retries and probes are abandoned even if the stop request itself is
    /// still queued; the segmenter, if running, is asked to terminate.
    /// Stopping a job that already finished is a no-op.
    pub async fn stop(&self) -> Result<()> {
        self.cancel.cancel();
        if self.event_tx.send(JobEvent::StopRequested).await.is_err() {
            debug!(job = %self.id, "stop requested after job runtime exited");
        }
        Ok(())
    }
}

/// Remove a finished job's output directory.
///
/// Job files are never removed implicitly; this is the only way they go.
pub fn cleanup_output(fs: &dyn FileSystem, report: &JobReport) -> Result<()> {
    if !fs.is_dir(&report.output_folder) {
        debug!(job = %report.id, dir = ?report.output_folder, "nothing to clean up");
        return Ok(());
    }
    fs.remove_dir_all(&report.output_folder)?;
    info!(job = %report.id, dir = ?report.output_folder, "output directory removed");
    Ok(())
}
