// src/supervisor/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::exec::{ProcessBackend, ProcessEvent, SegmenterCommand};
use crate::fs::FileSystem;
use crate::http::HttpBackend;
use crate::manifest::{CannedManifests, ManifestStateManager};
use crate::status_sync::{ensure_end_marker, StatusSync, SyncOutcome};
use crate::types::JobNotification;

use super::core::JobCore;
use super::handle::JobServices;
use super::{JobCommand, JobEvent, JobReport, ProbeOutcome, StartNotification, TimerKind};

/// Drives one job's [`JobCore`] in response to [`JobEvent`]s and performs the
/// resulting commands.
///
/// This is the job's single execution context: events are taken one at a
/// time from one channel, so handlers never overlap. Work that has to wait
/// (probes, timers, callbacks, the segmenter itself) runs in spawned tasks
/// that report back through the same channel.
pub struct JobRuntime<P: ProcessBackend> {
    core: JobCore,
    event_rx: mpsc::Receiver<JobEvent>,
    /// Weak, so the loop ends if every external sender is gone.
    event_tx: mpsc::WeakSender<JobEvent>,
    /// Events produced while executing commands, handled before the channel.
    deferred: VecDeque<JobEvent>,
    notify_tx: mpsc::UnboundedSender<JobNotification>,
    cancel: CancellationToken,
    fs: Arc<dyn FileSystem>,
    http: Arc<dyn HttpBackend>,
    canned: Arc<CannedManifests>,
    process: P,
    sync_tasks: Vec<JoinHandle<SyncOutcome>>,
    /// Start notifications whose result has not come back yet.
    pending_callbacks: usize,
}

impl<P: ProcessBackend> fmt::Debug for JobRuntime<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRuntime")
            .field("core", &self.core)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<P: ProcessBackend> JobRuntime<P> {
    pub fn new(
        core: JobCore,
        event_rx: mpsc::Receiver<JobEvent>,
        event_tx: mpsc::WeakSender<JobEvent>,
        notify_tx: mpsc::UnboundedSender<JobNotification>,
        cancel: CancellationToken,
        services: JobServices,
        process: P,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            deferred: VecDeque::new(),
            notify_tx,
            cancel,
            fs: services.fs,
            http: services.http,
            canned: services.canned,
            process,
            sync_tasks: Vec::new(),
            pending_callbacks: 0,
        }
    }

    /// Main event loop.
    ///
    /// Runs until the job has emitted its terminal notification, its
    /// segmenter (if any) has exited and every start notification result has
    /// been handled, then waits for outstanding status reconciliation and
    /// returns the final report.
    pub async fn run(mut self) -> JobReport {
        let job_id = self.core.job().id.clone();
        info!(job = %job_id, "job runtime started");

        loop {
            // The token flips as soon as the caller stops the job; act on it
            // before anything already queued ahead of the stop request.
            let stop_pending = self.cancel.is_cancelled() && !self.core.job().marked_as_stopped;
            let event = if stop_pending {
                JobEvent::StopRequested
            } else {
                match self.deferred.pop_front() {
                    Some(event) => event,
                    None => match self.event_rx.recv().await {
                        Some(event) => event,
                        None => {
                            info!(job = %job_id, "job event channel closed; exiting");
                            break;
                        }
                    },
                }
            };

            debug!(job = %job_id, ?event, "job received event");
            if matches!(event, JobEvent::CallbackCompleted(_)) {
                self.pending_callbacks = self.pending_callbacks.saturating_sub(1);
            }

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await;
            }

            if self.core.is_settled() {
                if self.pending_callbacks == 0 {
                    debug!(job = %job_id, status = %self.core.status(), "job settled");
                    break;
                }
                debug!(job = %job_id, "job settled; waiting for start notification result");
            }
        }

        for task in self.sync_tasks.drain(..) {
            match task.await {
                Ok(outcome) => debug!(job = %job_id, ?outcome, "status reconciliation finished"),
                Err(e) => error!(job = %job_id, error = %e, "status reconciliation task failed"),
            }
        }

        let report = self.core.report();
        info!(job = %job_id, status = %report.status, "job runtime exiting");
        report
    }

    async fn execute_command(&mut self, command: JobCommand) {
        // The caller may have stopped the job while this step was running.
        if self.cancel.is_cancelled() && starts_new_work(&command) {
            debug!(job = %self.core.job().id, ?command, "job cancelled; skipping command");
            return;
        }

        match command {
            JobCommand::Probe { url } => self.spawn_probe(url),
            JobCommand::Schedule { delay, timer } => self.spawn_timer(delay, timer),
            JobCommand::PrepareDirectory => {
                let result = self.prepare_directory();
                self.deferred.push_back(JobEvent::DirectoryPrepared(result));
            }
            JobCommand::Launch(command) => self.launch(command),
            JobCommand::Terminate => self.process.terminate(),
            JobCommand::NotifyStarted { url, body } => self.spawn_callback(url, body),
            JobCommand::SyncStatus { poll_delay } => self.sync_status(poll_delay),
            JobCommand::Emit(notification) => self.emit(notification),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<JobEvent>> {
        let sender = self.event_tx.upgrade();
        if sender.is_none() {
            debug!(job = %self.core.job().id, "job event channel gone; dropping deferred work");
        }
        sender
    }

    fn spawn_probe(&self, url: String) {
        let Some(tx) = self.sender() else { return };
        let http = Arc::clone(&self.http);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = http.get(&url) => match result {
                    Ok(status) => ProbeOutcome::Status(status),
                    Err(e) => ProbeOutcome::Transport(e.to_string()),
                },
            };
            let _ = tx.send(JobEvent::ProbeCompleted(outcome)).await;
        });
    }

    fn spawn_timer(&self, delay: Duration, timer: TimerKind) {
        let Some(tx) = self.sender() else { return };
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => {
                    let _ = tx.send(JobEvent::TimerElapsed(timer)).await;
                }
            }
        });
    }

    /// Recreate the output directory from scratch.
    ///
    /// Runs the filesystem calls inline on the runtime's thread. A process
    /// supervises a single job, so the blocking clear cannot stall another
    /// job's events; hosting several jobs on one runtime would call for
    /// `spawn_blocking` here and in [`Self::sync_status`].
    fn prepare_directory(&self) -> Result<(), String> {
        let dir = &self.core.job().output_folder;

        if self.fs.is_dir(dir) {
            debug!(job = %self.core.job().id, dir = ?dir, "clearing existing output directory");
            self.fs.remove_dir_all(dir).map_err(|e| format!("{e:#}"))?;
        }
        self.fs.create_dir_all(dir).map_err(|e| format!("{e:#}"))
    }

    fn launch(&mut self, command: SegmenterCommand) {
        let Some(tx) = self.sender() else { return };

        if let Err(e) = self.process.launch(command, tx) {
            error!(job = %self.core.job().id, error = %e, "could not launch segmenter");
            self.deferred.push_back(JobEvent::Process(ProcessEvent::Error {
                detail: e.to_string(),
                signal: None,
            }));
        }
    }

    fn spawn_callback(&mut self, url: String, body: StartNotification) {
        let Some(tx) = self.sender() else { return };
        let http = Arc::clone(&self.http);
        self.pending_callbacks += 1;

        tokio::spawn(async move {
            let result = match serde_json::to_value(&body) {
                Ok(json) => http.post_json(&url, json).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(JobEvent::CallbackCompleted(result)).await;
        });
    }

    /// Append the end marker now (inline, like [`Self::prepare_directory`])
    /// and schedule the delayed control-plane check.
    fn sync_status(&mut self, poll_delay: Duration) {
        let job = self.core.job();
        ensure_end_marker(self.fs.as_ref(), &job.manifest_path, &job.id);

        let manifests = ManifestStateManager::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.canned),
            job.manifest_path.clone(),
        );
        let sync = StatusSync::new(
            job.id.clone(),
            job.status_url(),
            Arc::clone(&self.http),
            manifests,
            self.notify_tx.clone(),
        );
        self.sync_tasks
            .push(tokio::spawn(sync.reconcile_after(poll_delay)));
    }

    fn emit(&self, notification: JobNotification) {
        let job_id = &self.core.job().id;
        match &notification {
            JobNotification::End => info!(job = %job_id, "job ended"),
            JobNotification::Error { kind, detail } => {
                error!(job = %job_id, %kind, %detail, "job failed")
            }
            JobNotification::Warning { kind, detail } => {
                warn!(job = %job_id, %kind, %detail, "job warning")
            }
        }

        if self.notify_tx.send(notification).is_err() {
            debug!(job = %job_id, "no listener for job notifications");
        }
    }
}

/// Commands that only lead to more work once they complete.
///
/// `Launch` is not among them: the core already counts the process as
/// running, and the pending stop will terminate it.
fn starts_new_work(command: &JobCommand) -> bool {
    matches!(
        command,
        JobCommand::Probe { .. } | JobCommand::Schedule { .. } | JobCommand::PrepareDirectory
    )
}
