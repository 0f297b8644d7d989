// src/exec/command.rs

use std::fmt;
use std::path::PathBuf;

/// One invocation of the segmenting process.
///
/// Input is the source stream URL; output is an HLS manifest at
/// `manifest_path` plus segment files next to it. Audio and video are
/// stream-copied, never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterCommand {
    pub program: String,
    pub source_url: String,
    pub user_agent: String,
    /// Segment length in seconds.
    pub segment_duration: u64,
    /// Number of segments kept in the live manifest.
    pub max_segment_window: u32,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl SegmenterCommand {
    pub fn args(&self) -> Vec<String> {
        let segment_pattern = self.output_dir.join("segment_%05d.ts");

        vec![
            "-hide_banner".into(),
            "-nostats".into(),
            "-loglevel".into(),
            "error".into(),
            "-user_agent".into(),
            self.user_agent.clone(),
            "-i".into(),
            self.source_url.clone(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "copy".into(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_duration.to_string(),
            "-hls_list_size".into(),
            self.max_segment_window.to_string(),
            "-hls_flags".into(),
            "delete_segments".into(),
            "-hls_segment_filename".into(),
            segment_pattern.to_string_lossy().into_owned(),
            // Machine-readable progress blocks on stdout.
            "-progress".into(),
            "pipe:1".into(),
            self.manifest_path.to_string_lossy().into_owned(),
        ]
    }
}

impl fmt::Display for SegmenterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args() {
            if arg.contains(' ') {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}
