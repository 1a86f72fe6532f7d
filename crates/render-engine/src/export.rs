//! Real-time export: record the composited surface while the video plays.
//!
//! ```text
//! Idle ──start──► Preparing ──► Recording ──Ended──► Finalizing ──► Done
//!                     │             │                    │
//!                     └─────────────┴──error/cancel──────┴──────► Failed
//! ```
//!
//! There is no second render loop. The session's frame tick pushes the
//! freshly composited surface into the recorder through [`ExportPipeline::capture_frame`]
//! while playback runs at normal speed. Frame count follows media time: a
//! tick owing several frames repeats the current picture, and the tail is
//! padded at end of media, so the recording lasts exactly as long as the source.

use reeltext_common::clock::FramePacer;
use reeltext_common::config::ExportSettings;
use reeltext_common::{ErrorCategory, ReeltextError, ReeltextResult};
use serde::Serialize;

use crate::audio::{AudioGraph, AudioTap};
use crate::media::{Artifact, DownloadSink, MediaPlayer, PlaybackEvent};
use crate::surface::{FrameSnapshot, Surface};

/// Hint shown when export is attempted before any playback.
pub const PLAY_FIRST_HINT: &str = "play the video once before exporting";

/// Export lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Preparing,
    Recording,
    Finalizing,
    Done,
    Failed,
}

impl ExportState {
    /// An export is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ExportState::Preparing | ExportState::Recording | ExportState::Finalizing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Done | ExportState::Failed)
    }
}

/// Frames read from the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCaptureStream {
    /// Device-pixel size of captured frames.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Audio read from the session's audio tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCaptureStream {
    pub tap: AudioTap,
}

/// Encoder settings handed to [`CaptureBackend::create_recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime_type: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl RecorderOptions {
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            mime_type: settings.mime_type.clone(),
            video_bitrate_kbps: settings.video_bitrate_kbps,
            audio_bitrate_kbps: settings.audio_bitrate_kbps,
        }
    }
}

/// Creates capture streams and recorders.
pub trait CaptureBackend {
    fn name(&self) -> &str;

    /// Whether recording into `mime_type` is possible at all.
    fn is_supported(&self, mime_type: &str) -> bool;

    fn capture_video(&mut self, surface: &dyn Surface, fps: u32) -> ReeltextResult<VideoCaptureStream>;

    fn capture_audio(&mut self, tap: &AudioTap) -> ReeltextResult<AudioCaptureStream>;

    fn create_recorder(
        &mut self,
        video: VideoCaptureStream,
        audio: AudioCaptureStream,
        options: &RecorderOptions,
    ) -> ReeltextResult<Box<dyn Recorder>>;
}

/// A running encoder fed with surface snapshots.
pub trait Recorder {
    fn start(&mut self) -> ReeltextResult<()>;

    fn push_frame(&mut self, frame: &FrameSnapshot) -> ReeltextResult<()>;

    /// Encoded data produced since the last call.
    fn drain_chunks(&mut self) -> ReeltextResult<Vec<Vec<u8>>>;

    /// Flush and stop, returning the remaining chunks.
    fn stop(&mut self) -> ReeltextResult<Vec<Vec<u8>>>;

    /// Stop immediately and discard output.
    fn abort(&mut self);

    fn mime_type(&self) -> &str;
}

/// File extension for a supported container.
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    let base = mime_type.split(';').next().unwrap_or("").trim();
    match base.to_ascii_lowercase().as_str() {
        "video/webm" => Some("webm"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}

/// Lowercase ASCII slug of a title; `export` when nothing is left.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "export".to_string()
    } else {
        slug
    }
}

/// Download name for an export of `title` in `mime_type`.
pub fn artifact_file_name(title: &str, mime_type: &str) -> String {
    format!("{}.{}", slugify(title), extension_for(mime_type).unwrap_or("bin"))
}

/// Why an export ended in [`ExportState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub category: ErrorCategory,
    pub message: String,
    pub hint: Option<String>,
}

impl ExportFailure {
    fn from_error(err: &ReeltextError) -> Self {
        Self {
            category: err.category(),
            message: err.to_string(),
            hint: err.hint().map(str::to_string),
        }
    }
}

impl std::fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Summary of a delivered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub location: String,
    pub frames: u64,
}

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportProgress {
    pub state: ExportState,
    /// Approximate completion `[0, 1]`: elapsed media time over duration.
    pub fraction: f64,
    pub elapsed_secs: f64,
    pub duration_secs: f64,
}

/// Progress callback for export reporting.
pub type ProgressCallback = Box<dyn FnMut(&ExportProgress)>;

/// Collaborators the pipeline borrows from the session when starting.
pub struct ExportContext<'a> {
    pub player: &'a mut dyn MediaPlayer,
    pub audio: &'a AudioGraph,
    pub surface: &'a dyn Surface,
}

/// The export state machine.
pub struct ExportPipeline {
    state: ExportState,
    backend: Box<dyn CaptureBackend>,
    sink: Box<dyn DownloadSink>,
    options: RecorderOptions,
    capture_fps: u32,
    recorder: Option<Box<dyn Recorder>>,
    chunks: Vec<Vec<u8>>,
    pacer: FramePacer,
    last_frame: Option<FrameSnapshot>,
    title: String,
    duration_secs: f64,
    elapsed_secs: f64,
    frames: u64,
    failure: Option<ExportFailure>,
    summary: Option<ExportSummary>,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("state", &self.state)
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .field("frames", &self.frames)
            .field("failure", &self.failure)
            .finish()
    }
}

impl ExportPipeline {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        sink: Box<dyn DownloadSink>,
        settings: &ExportSettings,
    ) -> Self {
        let capture_fps = settings.capture_fps.max(1);
        Self {
            state: ExportState::Idle,
            backend,
            sink,
            options: RecorderOptions::from_settings(settings),
            capture_fps,
            recorder: None,
            chunks: Vec::new(),
            pacer: FramePacer::new(capture_fps),
            last_frame: None,
            title: String::new(),
            duration_secs: 0.0,
            elapsed_secs: 0.0,
            frames: 0,
            failure: None,
            summary: None,
            on_progress: None,
        }
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.on_progress = Some(callback);
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn failure(&self) -> Option<&ExportFailure> {
        self.failure.as_ref()
    }

    pub fn summary(&self) -> Option<&ExportSummary> {
        self.summary.as_ref()
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames
    }

    /// Whether a recorder currently exists.
    pub fn has_recorder(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn progress(&self) -> ExportProgress {
        let fraction = match self.state {
            ExportState::Done => 1.0,
            _ if self.duration_secs > 0.0 => (self.elapsed_secs / self.duration_secs).clamp(0.0, 1.0),
            _ => 0.0,
        };
        ExportProgress {
            state: self.state,
            fraction,
            elapsed_secs: self.elapsed_secs,
            duration_secs: self.duration_secs,
        }
    }

    /// Begin an export: validate capabilities, build the recorder, rewind and play.
    ///
    /// A terminal pipeline is reset first. On failure the pipeline is left in
    /// `Failed` and the error is returned.
    pub fn start(&mut self, ctx: ExportContext<'_>) -> ReeltextResult<()> {
        if self.state.is_active() {
            return Err(ReeltextError::state("an export is already running"));
        }
        self.reset()?;

        let source = ctx.player.metadata();
        self.title = source.title.clone();
        self.duration_secs = source.duration_secs;
        self.elapsed_secs = 0.0;
        self.frames = 0;
        self.transition(ExportState::Preparing);

        tracing::info!(
            title = %self.title,
            mime = %self.options.mime_type,
            fps = self.capture_fps,
            "Starting export"
        );

        match self.prepare(ctx) {
            Ok(()) => {
                self.transition(ExportState::Recording);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn prepare(&mut self, ctx: ExportContext<'_>) -> ReeltextResult<()> {
        let tap = ctx.audio.tap().cloned().ok_or_else(|| {
            ReeltextError::capability("audio graph is not connected", PLAY_FIRST_HINT)
        })?;

        if extension_for(&self.options.mime_type).is_none() {
            return Err(ReeltextError::capability(
                format!("unknown export container '{}'", self.options.mime_type),
                "set export.mime_type to video/webm or video/mp4",
            ));
        }
        if !self.backend.is_supported(&self.options.mime_type) {
            return Err(ReeltextError::capability(
                format!(
                    "recording {} is not supported by the {} backend",
                    self.options.mime_type,
                    self.backend.name()
                ),
                "install ffmpeg or choose another container",
            ));
        }

        let video = self.backend.capture_video(ctx.surface, self.capture_fps)?;
        let audio = self.backend.capture_audio(&tap)?;
        let recorder = self.backend.create_recorder(video, audio, &self.options)?;
        let recorder = self.recorder.insert(recorder);

        ctx.player.seek(0.0)?;
        recorder.start()?;
        self.pacer = FramePacer::new(self.capture_fps).with_duration(self.duration_secs);
        self.last_frame = None;
        ctx.player.play()?;
        Ok(())
    }

    /// Push the current surface contents for every capture frame owed at
    /// `media_secs`.
    ///
    /// Called once per frame tick after compositing.
    pub fn capture_frame(&mut self, surface: &dyn Surface, media_secs: f64) {
        if self.state != ExportState::Recording {
            return;
        }
        self.elapsed_secs = media_secs.clamp(0.0, self.duration_secs.max(0.0));

        let due = self.pacer.frames_due(media_secs);
        if due == 0 {
            return;
        }
        let frame = match surface.snapshot() {
            Some(frame) => frame,
            None => {
                self.fail(ReeltextError::capability(
                    "drawing surface cannot be read back",
                    "export requires a raster surface",
                ));
                return;
            }
        };
        if let Err(e) = self.push_repeated(&frame, due) {
            self.fail(e);
            return;
        }
        self.last_frame = Some(frame);
        self.report();
    }

    /// Push `frame` `count` times and account for it.
    fn push_repeated(&mut self, frame: &FrameSnapshot, count: u64) -> ReeltextResult<()> {
        for _ in 0..count {
            self.push(frame)?;
            self.pacer.advance(1);
            self.frames += 1;
        }
        Ok(())
    }

    /// Hold the last picture until the recording covers the full duration.
    fn pad_to_duration(&mut self) -> ReeltextResult<()> {
        let remaining = self.pacer.frames_remaining();
        if remaining == 0 {
            return Ok(());
        }
        let Some(frame) = self.last_frame.take() else {
            return Ok(());
        };
        tracing::debug!(frames = remaining, "Padding export tail with the last frame");
        self.push_repeated(&frame, remaining)
    }

    fn push(&mut self, frame: &FrameSnapshot) -> ReeltextResult<()> {
        let recorder = self
            .recorder
            .as_mut()
            .ok_or_else(|| ReeltextError::state("recording without a recorder"))?;
        recorder.push_frame(frame)?;
        let chunks = recorder.drain_chunks()?;
        self.chunks.extend(chunks);
        Ok(())
    }

    /// React to playback transitions while recording.
    pub fn handle_playback_event(&mut self, event: &PlaybackEvent) {
        if self.state != ExportState::Recording {
            return;
        }
        match event {
            PlaybackEvent::Ended => {
                self.elapsed_secs = self.duration_secs;
                if let Err(e) = self.pad_to_duration().and_then(|()| self.finalize()) {
                    self.fail(e);
                }
            }
            PlaybackEvent::Error { message } => {
                self.fail(ReeltextError::resource(format!(
                    "playback failed during export: {message}"
                )));
            }
        }
    }

    fn finalize(&mut self) -> ReeltextResult<()> {
        self.transition(ExportState::Finalizing);

        let mut recorder = self
            .recorder
            .take()
            .ok_or_else(|| ReeltextError::state("finalizing without a recorder"))?;
        let mime_type = recorder.mime_type().to_string();
        let tail = recorder.stop()?;
        self.chunks.extend(tail);

        let bytes: Vec<u8> = std::mem::take(&mut self.chunks).concat();
        if bytes.is_empty() {
            return Err(ReeltextError::render("recorder produced no data"));
        }

        let artifact = Artifact {
            file_name: artifact_file_name(&self.title, &mime_type),
            mime_type,
            bytes,
        };
        let location = self.sink.deliver(&artifact)?;
        tracing::info!(
            file = %artifact.file_name,
            bytes = artifact.size_bytes(),
            frames = self.frames,
            location = %location,
            "Export complete"
        );

        self.summary = Some(ExportSummary {
            file_name: artifact.file_name,
            mime_type: artifact.mime_type,
            size_bytes: artifact.bytes.len(),
            location,
            frames: self.frames,
        });
        self.transition(ExportState::Done);
        Ok(())
    }

    /// Abort an in-flight export. Returns whether anything was cancelled.
    pub fn cancel(&mut self, player: &mut dyn MediaPlayer) -> bool {
        if !self.state.is_active() {
            return false;
        }
        if let Err(e) = player.pause() {
            tracing::warn!(error = %e, "Failed to pause playback while cancelling export");
        }
        self.fail(ReeltextError::cancelled("export cancelled by user"));
        true
    }

    /// Return a finished pipeline to `Idle`.
    pub fn reset(&mut self) -> ReeltextResult<()> {
        if self.state.is_active() {
            return Err(ReeltextError::state("cannot reset a running export"));
        }
        self.state = ExportState::Idle;
        self.failure = None;
        self.summary = None;
        self.chunks.clear();
        self.last_frame = None;
        self.elapsed_secs = 0.0;
        self.frames = 0;
        Ok(())
    }

    /// Enter `Failed`, discarding partial output. Returns the error for propagation.
    fn fail(&mut self, err: ReeltextError) -> ReeltextError {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort();
        }
        self.chunks.clear();
        self.last_frame = None;
        let failure = ExportFailure::from_error(&err);
        tracing::warn!(
            category = %failure.category,
            error = %failure.message,
            frames = self.frames,
            "Export failed"
        );
        self.failure = Some(failure);
        self.transition(ExportState::Failed);
        err
    }

    fn transition(&mut self, next: ExportState) {
        tracing::debug!(from = ?self.state, to = ?next, "Export state change");
        self.state = next;
        self.report();
    }

    fn report(&mut self) {
        let progress = self.progress();
        if let Some(cb) = self.on_progress.as_mut() {
            cb(&progress);
        }
    }
}

impl Drop for ExportPipeline {
    fn drop(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            tracing::warn!("Export pipeline dropped while recording; aborting recorder");
            recorder.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer Trip 2024!"), "summer-trip-2024");
        assert_eq!(slugify("  --Hello__World--  "), "hello-world");
        assert_eq!(slugify("Ünïcode ✓"), "n-code");
        assert_eq!(slugify("!!!"), "export");
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name("My Clip", "video/webm"), "my-clip.webm");
        assert_eq!(
            artifact_file_name("My Clip", "video/mp4; codecs=avc1"),
            "my-clip.mp4"
        );
        assert_eq!(artifact_file_name("x", "video/ogg"), "x.bin");
    }

    #[test]
    fn test_state_classification() {
        assert!(ExportState::Recording.is_active());
        assert!(!ExportState::Idle.is_active());
        assert!(ExportState::Failed.is_terminal());
        assert!(!ExportState::Finalizing.is_terminal());
    }

    #[test]
    fn test_failure_display_includes_hint() {
        let failure = ExportFailure::from_error(&ReeltextError::capability(
            "audio graph is not connected",
            PLAY_FIRST_HINT,
        ));
        assert_eq!(failure.category, ErrorCategory::Capability);
        let text = failure.to_string();
        assert!(text.starts_with("CapabilityError"));
        assert!(text.contains(PLAY_FIRST_HINT));
    }
}
