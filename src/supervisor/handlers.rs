// src/supervisor/handlers.rs

//! Event handling logic for the job core.
//!
//! Every handler that resumes deferred work (probe results, timers, directory
//! preparation, pre-start process failures) checks `marked_as_stopped` first;
//! a stop can land while any of that work is in flight.

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::exec::{ProcessEvent, TERMINATION_SIGNAL};
use crate::supervisor::{Job, JobCommand, ProbeOutcome, StartNotification, TimerKind};
use crate::types::{ErrorKind, JobNotification, JobStatus};

/// Move to `next` unless the job already reached a terminal status.
fn transition(job: &mut Job, next: JobStatus) -> bool {
    if job.status.is_terminal() {
        if job.status != next {
            debug!(job = %job.id, from = %job.status, to = %next, "ignoring transition out of terminal status");
        }
        return false;
    }
    if job.status != next {
        debug!(job = %job.id, from = %job.status, to = %next, "status transition");
        job.status = next;
    }
    true
}

pub fn handle_start_requested(job: &mut Job, at: Instant, commands: &mut Vec<JobCommand>) {
    if job.started_at.is_some() {
        warn!(job = %job.id, "start requested twice; ignoring");
        return;
    }
    job.started_at = Some(at);
    start(job, commands);
}

/// Probe the source; everything else waits for the probe result.
fn start(job: &mut Job, commands: &mut Vec<JobCommand>) {
    if job.marked_as_stopped {
        debug!(job = %job.id, "job stopped; not probing source");
        return;
    }
    if !transition(job, JobStatus::Verifying) {
        return;
    }

    debug!(job = %job.id, attempt = job.init_error_count + 1, "probing source");
    commands.push(JobCommand::Probe {
        url: job.source_url.clone(),
    });
}

pub fn handle_probe_completed(job: &mut Job, outcome: ProbeOutcome, commands: &mut Vec<JobCommand>) {
    if job.marked_as_stopped {
        debug!(job = %job.id, "job stopped; discarding probe result");
        return;
    }

    let detail = match outcome {
        ProbeOutcome::Status(200) => {
            let warmup = job.config.segment_duration() * 3;
            info!(job = %job.id, ?warmup, "source reachable; starting after warm-up");
            commands.push(JobCommand::Schedule {
                delay: warmup,
                timer: TimerKind::Warmup,
            });
            return;
        }
        ProbeOutcome::Status(status) => format!("source responded with HTTP {status}"),
        ProbeOutcome::Transport(reason) => format!("source unreachable: {reason}"),
    };

    let retry = &job.config.retry;
    job.init_error_count += 1;

    if job.init_error_count >= retry.max_init_attempts {
        error!(
            job = %job.id,
            attempts = job.init_error_count,
            %detail,
            "source probe failed; giving up"
        );
        transition(job, JobStatus::Errored);
        signal_error(job, ErrorKind::InitializationError, detail, commands);
        return;
    }

    warn!(
        job = %job.id,
        attempt = job.init_error_count,
        max = retry.max_init_attempts,
        %detail,
        "source probe failed; retrying"
    );
    commands.push(JobCommand::Schedule {
        delay: retry.init_interval,
        timer: TimerKind::Retry,
    });
}

pub fn handle_timer(job: &mut Job, timer: TimerKind, commands: &mut Vec<JobCommand>) {
    match timer {
        TimerKind::Retry => start(job, commands),
        TimerKind::Warmup => internal_start(job, commands),
    }
}

fn internal_start(job: &mut Job, commands: &mut Vec<JobCommand>) {
    if job.marked_as_stopped {
        debug!(job = %job.id, "job stopped; not preparing output");
        return;
    }
    if !transition(job, JobStatus::Starting) {
        return;
    }
    commands.push(JobCommand::PrepareDirectory);
}

pub fn handle_directory_prepared(
    job: &mut Job,
    result: Result<(), String>,
    commands: &mut Vec<JobCommand>,
) {
    if job.marked_as_stopped {
        debug!(job = %job.id, "job stopped; not launching segmenter");
        return;
    }

    match result {
        Ok(()) => {
            job.process_running = true;
            job.termination_requested = false;
            commands.push(JobCommand::Launch(job.segmenter_command()));
        }
        Err(reason) => {
            error!(job = %job.id, %reason, "could not prepare output directory");
            transition(job, JobStatus::Errored);
            signal_error(job, ErrorKind::DirectoryError, reason, commands);
        }
    }
}

pub fn handle_process_event(job: &mut Job, event: ProcessEvent, commands: &mut Vec<JobCommand>) {
    match event {
        ProcessEvent::Progress { at } => on_progress(job, at, commands),
        ProcessEvent::Error { detail, signal } => {
            job.process_running = false;
            if job.process_started {
                on_runtime_failure(job, detail, signal, commands);
            } else {
                on_prestart_failure(job, detail, commands);
            }
        }
        ProcessEvent::End => {
            job.process_running = false;
            if job.marked_as_finished {
                info!(job = %job.id, "segmenter finished as expected");
            } else {
                warn!(job = %job.id, "segmenter ended without being marked as finished");
            }
            transition(job, JobStatus::Finished);
            signal_end(job, commands);
        }
    }
}

fn on_progress(job: &mut Job, at: Instant, commands: &mut Vec<JobCommand>) {
    if job.status.is_terminal() {
        return;
    }

    if job.process_started {
        transition(job, JobStatus::Running);
        return;
    }

    job.process_started = true;
    let elapsed = job
        .started_at
        .map(|started| at.saturating_duration_since(started))
        .unwrap_or_default();
    job.live_delay = elapsed * 2;
    transition(job, JobStatus::Running);
    info!(job = %job.id, live_delay = ?job.live_delay, "segmenter started producing output");

    if let Some(url) = job.callback_url.clone() {
        commands.push(JobCommand::NotifyStarted {
            url,
            body: StartNotification {
                id: job.id.clone(),
                stream_url: job.stream_url(),
                live_delay: job.live_delay.as_secs(),
            },
        });
    }
}

/// The segmenter died before producing any output: the source is probably
/// not streaming yet, so go back through the probe.
fn on_prestart_failure(job: &mut Job, detail: String, commands: &mut Vec<JobCommand>) {
    if job.marked_as_stopped {
        debug!(job = %job.id, %detail, "segmenter exited after stop; not retrying");
        return;
    }

    let retry = &job.config.retry;
    job.process_error_count += 1;

    if job.process_error_count >= retry.max_process_attempts {
        error!(
            job = %job.id,
            attempts = job.process_error_count,
            %detail,
            "segmenter failed to start; giving up"
        );
        transition(job, JobStatus::Errored);
        signal_error(job, ErrorKind::InitializationProcessError, detail, commands);
        return;
    }

    warn!(
        job = %job.id,
        attempt = job.process_error_count,
        max = retry.max_process_attempts,
        %detail,
        "segmenter failed to start; retrying"
    );
    commands.push(JobCommand::Schedule {
        delay: retry.process_interval,
        timer: TimerKind::Retry,
    });
}

/// Only an exit by [`TERMINATION_SIGNAL`] that this job asked for is a clean
/// end; any other kill (OOM killer, an operator) is a runtime failure.
fn on_runtime_failure(
    job: &mut Job,
    detail: String,
    signal: Option<i32>,
    commands: &mut Vec<JobCommand>,
) {
    if job.termination_requested && signal == Some(TERMINATION_SIGNAL) {
        info!(job = %job.id, "segmenter terminated on request");
        transition(job, JobStatus::Finished);
        signal_end(job, commands);
        return;
    }

    error!(job = %job.id, %detail, ?signal, "segmenter failed while running");
    transition(job, JobStatus::Errored);
    signal_error(job, ErrorKind::ProcessError, detail, commands);
}

pub fn handle_callback_completed(
    job: &mut Job,
    result: Result<u16, String>,
    commands: &mut Vec<JobCommand>,
) {
    let detail = match result {
        Ok(200) => {
            info!(job = %job.id, "start notification delivered");
            return;
        }
        Ok(status) => format!("start notification rejected with HTTP {status}"),
        Err(reason) => format!("start notification failed: {reason}"),
    };
    signal_warning(ErrorKind::CallbackError, detail, commands);
}

pub fn handle_stop(job: &mut Job, commands: &mut Vec<JobCommand>) {
    if job.marked_as_stopped {
        debug!(job = %job.id, "stop requested twice; ignoring");
        return;
    }

    info!(job = %job.id, status = %job.status, "stopping job");
    job.marked_as_stopped = true;
    transition(job, JobStatus::Stopped);

    if job.process_running {
        job.termination_requested = true;
        commands.push(JobCommand::Terminate);
    }
    signal_end(job, commands);
}

pub fn handle_mark_as_finished(job: &mut Job) {
    debug!(job = %job.id, "job marked as finished");
    job.marked_as_finished = true;
}

fn signal_end(job: &mut Job, commands: &mut Vec<JobCommand>) {
    if !claim_terminal_signal(job, "end") {
        return;
    }
    push_status_sync(job, commands);
    commands.push(JobCommand::Emit(JobNotification::End));
}

fn signal_error(job: &mut Job, kind: ErrorKind, detail: String, commands: &mut Vec<JobCommand>) {
    if !claim_terminal_signal(job, "error") {
        return;
    }
    push_status_sync(job, commands);
    commands.push(JobCommand::Emit(JobNotification::Error { kind, detail }));
}

fn signal_warning(kind: ErrorKind, detail: String, commands: &mut Vec<JobCommand>) {
    commands.push(JobCommand::Emit(JobNotification::Warning { kind, detail }));
}

/// Only the first terminal signal of a job goes out; later ones are dropped.
fn claim_terminal_signal(job: &mut Job, signal: &str) -> bool {
    if job.marked_as_ended {
        if job.marked_as_stopped {
            debug!(job = %job.id, signal, "terminal signal after stop suppressed");
        } else {
            warn!(job = %job.id, signal, "second terminal signal suppressed");
        }
        return false;
    }
    job.marked_as_ended = true;
    true
}

fn push_status_sync(job: &Job, commands: &mut Vec<JobCommand>) {
    if !job.process_started {
        return;
    }
    let poll_delay = if job.live_delay.is_zero() {
        job.config.retry.status_poll_default_delay
    } else {
        job.live_delay * 2
    };
    commands.push(JobCommand::SyncStatus { poll_delay });
}
