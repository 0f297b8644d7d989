// src/manifest/canned.rs

use std::path::{Path, PathBuf};

use tracing::info;

use crate::fs::FileSystem;

use super::{ManifestError, Visibility, MARKER_PREFIX};

/// Substitute manifests shared by every job: `<base>/private/private.m3u8`
/// and `<base>/deleted/deleted.m3u8`.
///
/// Loaded once when the process starts and never written afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedManifests {
    private: String,
    deleted: String,
}

impl CannedManifests {
    /// Read both substitutes from under `base`, writing the built-in template
    /// for any that is missing.
    pub fn load(fs: &dyn FileSystem, base: &Path) -> Result<Self, ManifestError> {
        Ok(Self {
            private: load_one(fs, base, Visibility::Private)?,
            deleted: load_one(fs, base, Visibility::Deleted)?,
        })
    }

    /// Build from in-memory templates without touching disk.
    pub fn builtin() -> Self {
        Self {
            private: template(Visibility::Private),
            deleted: template(Visibility::Deleted),
        }
    }

    pub fn path_for(base: &Path, visibility: Visibility) -> PathBuf {
        let kind = visibility.as_str();
        base.join(kind).join(format!("{kind}.m3u8"))
    }

    /// Substitute content for a restricted visibility.
    ///
    /// `Public` has no substitute; the private one is returned so callers
    /// never fall back to an unrestricted listing.
    pub fn for_visibility(&self, visibility: Visibility) -> &str {
        match visibility {
            Visibility::Deleted => self.deleted.as_str(),
            Visibility::Private | Visibility::Public => self.private.as_str(),
        }
    }
}

fn load_one(
    fs: &dyn FileSystem,
    base: &Path,
    visibility: Visibility,
) -> Result<String, ManifestError> {
    let path = CannedManifests::path_for(base, visibility);

    if !fs.exists(&path) {
        let content = template(visibility);
        fs.write(&path, content.as_bytes())
            .map_err(|e| ManifestError::Write {
                path: path.clone(),
                reason: format!("{e:#}"),
            })?;
        info!(path = ?path, "provisioned substitute manifest");
        return Ok(content);
    }

    let content = fs.read_to_string(&path).map_err(|e| ManifestError::Read {
        path: path.clone(),
        reason: format!("{e:#}"),
    })?;

    match Visibility::of_manifest(&content) {
        Ok(found) if found == visibility => Ok(content),
        _ => Err(ManifestError::CannedMarker {
            path,
            expected: visibility,
        }),
    }
}

fn template(visibility: Visibility) -> String {
    format!(
        "{MARKER_PREFIX}{visibility}\n#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:1\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-ENDLIST\n"
    )
}
