// src/exec/process_runner.rs

//! Runs one segmenter process instance.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::supervisor::JobEvent;

use super::{ProcessEvent, SegmenterCommand};

/// Stderr lines kept for the error detail of a failed run.
const STDERR_TAIL_LINES: usize = 20;

/// Run a segmenter process until it exits, emitting `Progress` for every
/// progress block on stdout and exactly one `Error` or `End` at the end.
///
/// - A spawn failure is reported as `Error` without a signal.
/// - If the cancel channel fires, the child is killed and its exit (carrying
///   the kill signal) is reported like any other abnormal exit.
pub async fn run_segmenter(
    job_id: String,
    command: SegmenterCommand,
    events_tx: mpsc::Sender<JobEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let outcome = match run_segmenter_inner(&job_id, &command, &events_tx, cancel_rx).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(job = %job_id, error = %format!("{err:#}"), "segmenter execution error");
            ProcessEvent::Error {
                detail: format!("{err:#}"),
                signal: None,
            }
        }
    };

    if events_tx.send(JobEvent::Process(outcome)).await.is_err() {
        debug!(job = %job_id, "job runtime gone before segmenter exit was delivered");
    }
}

async fn run_segmenter_inner(
    job_id: &str,
    command: &SegmenterCommand,
    events_tx: &mpsc::Sender<JobEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<ProcessEvent> {
    info!(job = %job_id, cmd = %command, "starting segmenter process");

    let mut cmd = Command::new(&command.program);
    cmd.args(command.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning segmenter '{}'", command.program))?;

    let progress_task = child
        .stdout
        .take()
        .map(|stdout| spawn_progress_monitor(job_id.to_string(), stdout, events_tx.clone()));

    let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| spawn_stderr_collector(job_id.to_string(), stderr, Arc::clone(&stderr_tail)));

    let status = tokio::select! {
        status_res = child.wait() => {
            status_res.context("waiting for segmenter process")?
        }

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => info!(job = %job_id, "termination requested; killing segmenter"),
                Err(_) => debug!(job = %job_id, "process backend dropped; killing segmenter"),
            }
            if let Err(e) = child.start_kill() {
                warn!(job = %job_id, error = %e, "failed to kill segmenter process");
            }
            child.wait().await.context("waiting for killed segmenter process")?
        }
    };

    // Drain the pipes first so no progress event can trail the exit event.
    if let Some(task) = progress_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let signal = exit_signal(&status);
    info!(
        job = %job_id,
        exit_code = ?status.code(),
        signal = ?signal,
        success = status.success(),
        "segmenter process exited"
    );

    if status.success() {
        return Ok(ProcessEvent::End);
    }

    let tail: Vec<String> = stderr_tail
        .lock()
        .map(|lines| lines.iter().cloned().collect())
        .unwrap_or_default();
    let mut detail = match (status.code(), signal) {
        (Some(code), _) => format!("segmenter exited with code {code}"),
        (None, Some(sig)) => format!("segmenter killed by signal {sig}"),
        (None, None) => "segmenter exited abnormally".to_string(),
    };
    if !tail.is_empty() {
        detail.push_str(": ");
        detail.push_str(&tail.join(" | "));
    }

    Ok(ProcessEvent::Error { detail, signal })
}

/// `-progress pipe:1` writes `key=value` lines and closes each block with a
/// `progress=continue` (or `progress=end`) line; each block is one event.
fn spawn_progress_monitor(
    job_id: String,
    stdout: ChildStdout,
    events_tx: mpsc::Sender<JobEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if !line.starts_with("progress=") {
                continue;
            }
            let event = JobEvent::Process(ProcessEvent::Progress { at: Instant::now() });
            if events_tx.send(event).await.is_err() {
                break;
            }
        }

        debug!(job = %job_id, "progress monitor ended");
    })
}

fn spawn_stderr_collector(
    job_id: String,
    stderr: ChildStderr,
    tail: Arc<Mutex<VecDeque<String>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            debug!(job = %job_id, "stderr: {}", line);
            if let Ok(mut tail) = tail.lock() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
    })
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
