// src/supervisor/mod.rs

//! Job supervision.
//!
//! This module ties together:
//! - the job record and its derived paths ([`job`])
//! - the pure state machine that decides what happens next ([`core`],
//!   with per-event logic in [`handlers`])
//! - the async shell that performs probes, timers, directory preparation,
//!   process launches and notifications ([`runtime`])
//! - the caller-facing handle ([`handle`])
//!
//! All events for one job flow through a single channel and are handled one
//! at a time, so no two handlers for the same job ever run concurrently.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::exec::{ProcessEvent, SegmenterCommand};
use crate::types::JobNotification;

pub mod core;
pub mod handle;
pub mod handlers;
pub mod job;
pub mod runtime;

pub use self::core::{JobCore, JobStep};
pub use handle::{cleanup_output, spawn_job, JobHandle, JobServices, StopHandle};
pub use job::{Job, JobReport, JobSpec};
pub use runtime::JobRuntime;

/// Which pending timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Re-run the reachability probe after a failed attempt.
    Retry,
    /// Encoder warm-up buffer after a successful probe has elapsed.
    Warmup,
}

/// Result of one reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The source answered with this HTTP status.
    Status(u16),
    /// The request did not complete.
    Transport(String),
}

/// Events flowing into a job's runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The caller asked the job to start.
    StartRequested { at: Instant },
    ProbeCompleted(ProbeOutcome),
    TimerElapsed(TimerKind),
    /// The output directory was (re)created, or could not be.
    DirectoryPrepared(Result<(), String>),
    Process(ProcessEvent),
    /// The start notification POST finished with a status, or failed.
    CallbackCompleted(Result<u16, String>),
    StopRequested,
    MarkAsFinished,
}

/// Body of the one-time start notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartNotification {
    pub id: String,
    #[serde(rename = "upcloseStreamUrl")]
    pub stream_url: String,
    /// Observed live delay in whole seconds.
    #[serde(rename = "liveDelay")]
    pub live_delay: u64,
}

/// Commands produced by the core, executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCommand {
    Probe { url: String },
    Schedule { delay: Duration, timer: TimerKind },
    PrepareDirectory,
    Launch(SegmenterCommand),
    Terminate,
    NotifyStarted { url: String, body: StartNotification },
    /// Finalise the manifest and reconcile visibility with the control plane
    /// after `poll_delay`.
    SyncStatus { poll_delay: Duration },
    Emit(JobNotification),
}
