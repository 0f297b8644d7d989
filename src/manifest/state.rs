// src/manifest/state.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::fs::FileSystem;

use super::{CannedManifests, ManifestError, Visibility, BACKUP_FILE};

/// Performs visibility transitions on one job's live manifest.
///
/// Transitions are whole-file replacements: a restricting mark first backs up
/// the public manifest to `master.bck.m3u8`, then writes the shared
/// substitute over `master.m3u8`. Restoring copies the backup back.
#[derive(Debug, Clone)]
pub struct ManifestStateManager {
    fs: Arc<dyn FileSystem>,
    canned: Arc<CannedManifests>,
    manifest_path: PathBuf,
    backup_path: PathBuf,
}

impl ManifestStateManager {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        canned: Arc<CannedManifests>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        let manifest_path = manifest_path.into();
        let backup_path = manifest_path.with_file_name(BACKUP_FILE);
        Self {
            fs,
            canned,
            manifest_path,
            backup_path,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn get_status(&self) -> Result<Visibility, ManifestError> {
        let content = self.read_manifest()?;
        self.visibility_of(&content)
    }

    /// Copy the current public manifest to the backup path.
    ///
    /// Refuses to back up a manifest that already carries a restricting
    /// marker, so a backup always holds the real stream listing.
    pub fn backup(&self) -> Result<(), ManifestError> {
        let content = self.read_manifest()?;
        let visibility = self.visibility_of(&content)?;
        if visibility != Visibility::Public {
            return Err(ManifestError::NotMaster {
                path: self.manifest_path.clone(),
                visibility,
            });
        }

        self.fs
            .write(&self.backup_path, content.as_bytes())
            .map_err(|e| ManifestError::Write {
                path: self.backup_path.clone(),
                reason: format!("{e:#}"),
            })?;
        debug!(backup = ?self.backup_path, "manifest backed up");
        Ok(())
    }

    pub fn mark_as_private(&self) -> Result<(), ManifestError> {
        self.mark(Visibility::Private)
    }

    pub fn mark_as_deleted(&self) -> Result<(), ManifestError> {
        self.mark(Visibility::Deleted)
    }

    /// Put the backed-up manifest back in place.
    pub fn mark_as_restored(&self) -> Result<(), ManifestError> {
        self.fs
            .copy(&self.backup_path, &self.manifest_path)
            .map_err(|e| {
                if !self.fs.exists(&self.backup_path) {
                    ManifestError::BackupMissing {
                        path: self.backup_path.clone(),
                    }
                } else {
                    ManifestError::Write {
                        path: self.manifest_path.clone(),
                        reason: format!("{e:#}"),
                    }
                }
            })?;
        info!(manifest = ?self.manifest_path, "manifest restored from backup");
        Ok(())
    }

    fn mark(&self, visibility: Visibility) -> Result<(), ManifestError> {
        self.backup()?;

        let substitute = self.canned.for_visibility(visibility);
        self.fs
            .write(&self.manifest_path, substitute.as_bytes())
            .map_err(|e| ManifestError::Write {
                path: self.manifest_path.clone(),
                reason: format!("{e:#}"),
            })?;
        info!(manifest = ?self.manifest_path, %visibility, "manifest marked");
        Ok(())
    }

    fn read_manifest(&self) -> Result<String, ManifestError> {
        self.fs
            .read_to_string(&self.manifest_path)
            .map_err(|e| ManifestError::Read {
                path: self.manifest_path.clone(),
                reason: format!("{e:#}"),
            })
    }

    fn visibility_of(&self, content: &str) -> Result<Visibility, ManifestError> {
        Visibility::of_manifest(content).map_err(|value| ManifestError::UnknownMarker {
            path: self.manifest_path.clone(),
            value,
        })
    }
}
