//! Delivering finished exports to a directory.

use std::path::{Path, PathBuf};

use reeltext_common::ReeltextResult;
use reeltext_render_engine::media::{Artifact, DownloadSink};

/// Writes artifacts into a directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloadSink {
    fn deliver(&mut self, artifact: &Artifact) -> ReeltextResult<String> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = artifact.size_bytes(),
            mime = %artifact.mime_type,
            "Export written"
        );
        Ok(path.display().to_string())
    }
}
