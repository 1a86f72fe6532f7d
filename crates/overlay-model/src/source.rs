//! Metadata of the source video being annotated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::Size;

/// A source video handed over by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVideo {
    /// Location of the media file.
    pub path: PathBuf,

    /// Human-readable session title; export file names derive from it.
    pub title: String,

    pub duration_secs: f64,

    /// Intrinsic picture size in pixels.
    pub width: u32,
    pub height: u32,

    /// Native frame rate.
    pub frame_rate: f64,

    /// Whether the file carries an audio stream.
    pub has_audio: bool,
}

impl SourceVideo {
    /// Intrinsic size as layout dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// Title derived from a file path: the file stem, or `"untitled"`.
    pub fn title_from_path(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("untitled")
            .to_string()
    }

    /// Whether metadata is usable for layout and export.
    pub fn is_playable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.duration_secs.is_finite()
            && self.duration_secs > 0.0
    }
}
