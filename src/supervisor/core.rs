// src/supervisor/core.rs

//! Pure job state machine.
//!
//! [`JobCore`] consumes [`JobEvent`]s and produces:
//! - an updated [`Job`] record
//! - a list of [`JobCommand`]s describing what the IO shell should do next
//!
//! The async shell ([`super::runtime::JobRuntime`]) is responsible for
//! performing probes and timers, touching the filesystem, launching the
//! segmenter and delivering notifications.
//!
//! The core has no channels, no Tokio tasks and performs no IO, so every
//! transition can be unit tested deterministically.

use std::sync::Arc;

use crate::config::Config;
use crate::supervisor::handlers::{
    handle_callback_completed, handle_directory_prepared, handle_mark_as_finished,
    handle_probe_completed, handle_process_event, handle_start_requested, handle_stop,
    handle_timer,
};
use crate::supervisor::{Job, JobCommand, JobEvent, JobReport, JobSpec};
use crate::types::JobStatus;

/// Commands returned by the core after handling a single [`JobEvent`].
#[derive(Debug, Clone, Default)]
pub struct JobStep {
    pub commands: Vec<JobCommand>,
}

#[derive(Debug)]
pub struct JobCore {
    job: Job,
}

impl JobCore {
    pub fn new(spec: JobSpec, config: Arc<Config>) -> Self {
        Self {
            job: Job::new(spec, config),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    /// True once a terminal notification has gone out and no segmenter is
    /// left running; nothing further can change the job.
    pub fn is_settled(&self) -> bool {
        self.job.marked_as_ended && !self.job.process_running
    }

    pub fn report(&self) -> JobReport {
        self.job.report()
    }

    /// Handle a single event, updating the job and returning the resulting
    /// commands for the IO shell.
    pub fn step(&mut self, event: JobEvent) -> JobStep {
        let mut commands = Vec::new();
        let job = &mut self.job;

        match event {
            JobEvent::StartRequested { at } => handle_start_requested(job, at, &mut commands),
            JobEvent::ProbeCompleted(outcome) => {
                handle_probe_completed(job, outcome, &mut commands)
            }
            JobEvent::TimerElapsed(timer) => handle_timer(job, timer, &mut commands),
            JobEvent::DirectoryPrepared(result) => {
                handle_directory_prepared(job, result, &mut commands)
            }
            JobEvent::Process(event) => handle_process_event(job, event, &mut commands),
            JobEvent::CallbackCompleted(result) => {
                handle_callback_completed(job, result, &mut commands)
            }
            JobEvent::StopRequested => handle_stop(job, &mut commands),
            JobEvent::MarkAsFinished => handle_mark_as_finished(job),
        }

        JobStep { commands }
    }
}
