use std::fmt;

use serde::Serialize;

/// Lifecycle status of a supervised job.
///
/// `Finished`, `Errored` and `Stopped` are terminal: once reached, the job
/// never moves to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Initialized,
    Verifying,
    Starting,
    Running,
    Finished,
    Errored,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Errored | JobStatus::Stopped)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Initialized
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Initialized => "initialized",
            JobStatus::Verifying => "verifying",
            JobStatus::Starting => "starting",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Errored => "errored",
            JobStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Classification of job-level failures reported to the caller.
///
/// `CallbackError` and `ManifestStateError` only ever travel as warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InitializationError,
    InitializationProcessError,
    ProcessError,
    DirectoryError,
    CallbackError,
    ManifestStateError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InitializationError => "InitializationError",
            ErrorKind::InitializationProcessError => "InitializationProcessError",
            ErrorKind::ProcessError => "ProcessError",
            ErrorKind::DirectoryError => "DirectoryError",
            ErrorKind::CallbackError => "CallbackError",
            ErrorKind::ManifestStateError => "ManifestStateError",
        };
        f.write_str(s)
    }
}

/// Notification delivered to whoever owns the job.
///
/// A job emits exactly one of `End` / `Error`, plus any number of warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobNotification {
    End,
    Error { kind: ErrorKind, detail: String },
    Warning { kind: ErrorKind, detail: String },
}

impl JobNotification {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobNotification::Warning { .. })
    }
}
