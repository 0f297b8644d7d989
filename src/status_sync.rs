// src/status_sync.rs

//! Post-terminal reconciliation of a job's manifest with the control plane.
//!
//! Once a job that actually produced output ends or fails:
//! 1. its manifest gets an end-of-stream tag so players stop polling;
//! 2. after a delay, the control plane is asked whether the broadcast still
//!    exists; a 404 means it was taken down, and the manifest is switched to
//!    the private substitute.
//!
//! Nothing here can change the job's outcome; failures are logged and
//! surfaced as warnings.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::http::HttpBackend;
use crate::manifest::{with_end_marker, ManifestStateManager, Visibility};
use crate::types::{ErrorKind, JobNotification};

/// What the delayed control-plane check concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The control plane still knows the broadcast (any non-404 status).
    Listed(u16),
    /// The broadcast is gone and the manifest was already private.
    AlreadyPrivate,
    /// The broadcast is gone and the manifest was switched to private.
    Privatized,
    /// The status request itself failed.
    Unreachable(String),
    /// The broadcast is gone but the manifest could not be privatized.
    Failed(String),
}

/// Append the end-of-stream tag to the manifest if it is missing.
///
/// Best-effort: read and write failures are logged and reported as `false`.
pub fn ensure_end_marker(fs: &dyn FileSystem, manifest_path: &Path, job_id: &str) -> bool {
    let content = match fs.read_to_string(manifest_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(job = %job_id, manifest = ?manifest_path, error = %format!("{e:#}"), "cannot read manifest to end it");
            return false;
        }
    };

    let Some(ended) = with_end_marker(&content) else {
        debug!(job = %job_id, "manifest already ended");
        return true;
    };

    match fs.write(manifest_path, ended.as_bytes()) {
        Ok(()) => {
            info!(job = %job_id, manifest = ?manifest_path, "end marker appended to manifest");
            true
        }
        Err(e) => {
            warn!(job = %job_id, manifest = ?manifest_path, error = %format!("{e:#}"), "cannot write ended manifest");
            false
        }
    }
}

pub struct StatusSync {
    job_id: String,
    status_url: String,
    http: Arc<dyn HttpBackend>,
    manifests: ManifestStateManager,
    notify_tx: mpsc::UnboundedSender<JobNotification>,
}

impl std::fmt::Debug for StatusSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSync")
            .field("job_id", &self.job_id)
            .field("status_url", &self.status_url)
            .field("manifests", &self.manifests)
            .finish_non_exhaustive()
    }
}

impl StatusSync {
    pub fn new(
        job_id: impl Into<String>,
        status_url: impl Into<String>,
        http: Arc<dyn HttpBackend>,
        manifests: ManifestStateManager,
        notify_tx: mpsc::UnboundedSender<JobNotification>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status_url: status_url.into(),
            http,
            manifests,
            notify_tx,
        }
    }

    /// Wait `delay`, then reconcile manifest visibility with the control
    /// plane.
    pub async fn reconcile_after(self, delay: Duration) -> SyncOutcome {
        debug!(job = %self.job_id, ?delay, "status check scheduled");
        sleep(delay).await;
        self.reconcile().await
    }

    pub async fn reconcile(&self) -> SyncOutcome {
        let status = match self.http.get(&self.status_url).await {
            Ok(status) => status,
            Err(e) => {
                warn!(job = %self.job_id, url = %self.status_url, error = %e, "control plane status check failed");
                return SyncOutcome::Unreachable(e.to_string());
            }
        };

        if status != 404 {
            debug!(job = %self.job_id, status, "broadcast still listed");
            return SyncOutcome::Listed(status);
        }

        info!(job = %self.job_id, "broadcast removed by control plane; hiding stream");
        let result = self.manifests.get_status().and_then(|visibility| {
            if visibility == Visibility::Private {
                Ok(SyncOutcome::AlreadyPrivate)
            } else {
                self.manifests.mark_as_private().map(|()| SyncOutcome::Privatized)
            }
        });

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let detail = e.to_string();
                warn!(job = %self.job_id, error = %detail, "could not privatize manifest");
                let _ = self.notify_tx.send(JobNotification::Warning {
                    kind: ErrorKind::ManifestStateError,
                    detail: detail.clone(),
                });
                SyncOutcome::Failed(detail)
            }
        }
    }
}
