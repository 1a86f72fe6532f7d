//! Playback and delivery collaborators of an editing session.

use reeltext_common::ReeltextResult;
use reeltext_overlay_model::source::SourceVideo;

use crate::surface::VideoFrame;

/// Notable playback transitions, drained once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback reached the natural end of the media.
    Ended,
    /// Decoding or playback failed; playback has stopped.
    Error { message: String },
}

/// A video element: decodes the source and keeps a current frame.
pub trait MediaPlayer {
    fn metadata(&self) -> &SourceVideo;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn seek(&mut self, secs: f64) -> ReeltextResult<()>;

    fn play(&mut self) -> ReeltextResult<()>;

    fn pause(&mut self) -> ReeltextResult<()>;

    /// Most recently decoded picture, if any.
    fn current_frame(&self) -> Option<&VideoFrame>;

    /// Advance internal state and return events since the last call.
    fn poll_events(&mut self) -> Vec<PlaybackEvent>;
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Hands a finished artifact to the user.
pub trait DownloadSink {
    /// Deliver the artifact, returning a description of where it went.
    fn deliver(&mut self, artifact: &Artifact) -> ReeltextResult<String>;
}
