// src/manifest/mod.rs

//! Manifest visibility state.
//!
//! A job's live manifest (`<base>/<id>/master.m3u8`) doubles as the carrier of
//! its public visibility. An optional first line `#type:<private|deleted>`
//! restricts it; no marker means public.
//!
//! - [`state`] holds [`ManifestStateManager`], which performs the
//!   backup / mark / restore transitions.
//! - [`canned`] loads the shared substitute manifests served in place of a
//!   restricted stream.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub mod canned;
pub mod state;

pub use canned::CannedManifests;
pub use state::ManifestStateManager;

/// Prefix of the in-band visibility marker line.
pub const MARKER_PREFIX: &str = "#type:";

/// HLS end-of-stream tag.
pub const END_MARKER: &str = "#EXT-X-ENDLIST";

/// File name of the live manifest inside a job directory.
pub const MANIFEST_FILE: &str = "master.m3u8";

/// File name of the backup written before a restricting transition.
pub const BACKUP_FILE: &str = "master.bck.m3u8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Deleted,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Deleted => "deleted",
        }
    }

    /// Visibility encoded in manifest text: the marker on the first line, or
    /// `Public` when there is none.
    pub fn of_manifest(content: &str) -> Result<Self, String> {
        let first = content.lines().next().unwrap_or_default();
        match first.strip_prefix(MARKER_PREFIX) {
            Some(value) => value.trim().parse(),
            None => Ok(Visibility::Public),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "deleted" => Ok(Visibility::Deleted),
            other => Err(other.to_string()),
        }
    }
}

/// Failures of manifest state transitions.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write manifest {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("cannot back up a non-master manifest {path:?} (currently {visibility})")]
    NotMaster { path: PathBuf, visibility: Visibility },

    #[error("unknown visibility marker '{value}' in {path:?}")]
    UnknownMarker { path: PathBuf, value: String },

    #[error("no backup to restore at {path:?}")]
    BackupMissing { path: PathBuf },

    #[error("substitute manifest {path:?} must start with '#type:{expected}'")]
    CannedMarker { path: PathBuf, expected: Visibility },
}

/// Return `content` with an end-of-stream tag appended, or `None` when the
/// manifest already ends the stream.
pub fn with_end_marker(content: &str) -> Option<String> {
    if content.lines().any(|line| line.trim() == END_MARKER) {
        return None;
    }

    let mut ended = String::with_capacity(content.len() + END_MARKER.len() + 2);
    ended.push_str(content);
    if !ended.is_empty() && !ended.ends_with('\n') {
        ended.push('\n');
    }
    ended.push_str(END_MARKER);
    ended.push('\n');
    Some(ended)
}
