// src/exec/mod.rs

//! Segmenter process execution layer.
//!
//! This module launches the external segmenting process with
//! `tokio::process::Command` and reports its lifecycle back to the job
//! runtime as [`ProcessEvent`]s.
//!
//! - [`command`] builds the encoder invocation from job parameters.
//! - [`process_runner`] runs one process instance: progress parsing, stderr
//!   capture, exit classification, and deliberate termination.
//! - [`backend`] provides the `ProcessBackend` trait and the production
//!   `FfmpegBackend`; tests replace it with a fake that injects events.

use tokio::time::Instant;

pub mod backend;
pub mod command;
pub mod process_runner;

pub use backend::{FfmpegBackend, ProcessBackend};
pub use command::SegmenterCommand;

/// Signal used to stop a segmenter on purpose.
///
/// `tokio::process::Child::start_kill` delivers SIGKILL on Unix, so this is
/// both the signal sent by [`ProcessBackend::terminate`] and the one the job
/// checks for when deciding whether an abnormal exit was its own doing.
pub const TERMINATION_SIGNAL: i32 = 9;

/// Lifecycle events of one segmenter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The process reported encoding progress.
    Progress { at: Instant },
    /// The process failed to spawn or exited unsuccessfully. `signal` is set
    /// when it was killed by a signal.
    Error { detail: String, signal: Option<i32> },
    /// The process exited cleanly.
    End,
}
