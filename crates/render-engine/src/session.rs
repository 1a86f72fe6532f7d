//! One editing session: a loaded video, its overlays, and the live preview.
//!
//! The session is shared between the render loop and input handlers as
//! `Rc<RefCell<EditorSession>>`; everything runs on one logical thread.

use std::cell::RefCell;
use std::rc::Rc;

use reeltext_common::clock::SessionClock;
use reeltext_common::config::{AppConfig, EditorDefaults};
use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::command::EditCommand;
use reeltext_overlay_model::layout::{DrawRect, Size, SurfaceMetrics};
use reeltext_overlay_model::overlay::{OverlayId, Position};
use reeltext_overlay_model::source::SourceVideo;
use reeltext_overlay_model::store::OverlayStore;

use crate::animation::FrameTime;
use crate::audio::{AudioBackend, AudioGraph};
use crate::compositor::{FrameInput, FrameRenderer, FrameStats, RenderOptions};
use crate::export::{
    CaptureBackend, ExportContext, ExportFailure, ExportPipeline, ExportProgress, ExportState,
    ExportSummary, ProgressCallback,
};
use crate::interaction::{DragController, SurfaceBounds};
use crate::media::{DownloadSink, MediaPlayer, PlaybackEvent};
use crate::render_loop::{LoopHandle, RenderLoop};
use crate::surface::Surface;

/// Platform pieces a session is assembled from.
pub struct SessionParts {
    pub surface: Box<dyn Surface>,
    pub audio: Box<dyn AudioBackend>,
    pub capture: Box<dyn CaptureBackend>,
    pub sink: Box<dyn DownloadSink>,
}

pub struct EditorSession {
    defaults: EditorDefaults,
    render_fps: u32,
    renderer: FrameRenderer,
    surface: Box<dyn Surface>,
    player: Option<Box<dyn MediaPlayer>>,
    store: OverlayStore,
    rect: DrawRect,
    bounds: SurfaceBounds,
    drag: DragController,
    audio: AudioGraph,
    export: ExportPipeline,
    clock: SessionClock,
    last_stats: FrameStats,
    frames: u64,
    torn_down: bool,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("source", &self.source().map(|s| &s.title))
            .field("overlays", &self.store.len())
            .field("rect", &self.rect)
            .field("export", &self.export.state())
            .field("frames", &self.frames)
            .finish()
    }
}

impl EditorSession {
    pub fn new(config: &AppConfig, parts: SessionParts) -> ReeltextResult<Self> {
        let renderer = FrameRenderer::new(RenderOptions::from_settings(&config.render)?);
        let size = parts.surface.size();
        let clock = SessionClock::start();
        tracing::info!(started = clock.epoch_wall(), "Editor session created");

        Ok(Self {
            defaults: config.editor.clone(),
            render_fps: config.render.fps.max(1),
            renderer,
            surface: parts.surface,
            player: None,
            store: OverlayStore::new(config.editor.clone()),
            rect: DrawRect::EMPTY,
            bounds: SurfaceBounds::new(0.0, 0.0, size.width, size.height),
            drag: DragController::new(),
            audio: AudioGraph::new(parts.audio),
            export: ExportPipeline::new(parts.capture, parts.sink, &config.export),
            clock,
            last_stats: FrameStats::default(),
            frames: 0,
            torn_down: false,
        })
    }

    /// Replace the source video. Overlays and the audio tap belong to the
    /// previous video and are discarded.
    pub fn load_video(&mut self, player: Box<dyn MediaPlayer>) -> ReeltextResult<()> {
        self.ensure_live()?;
        if self.export.state().is_active() {
            return Err(ReeltextError::state("cannot load a video while exporting"));
        }

        let source = player.metadata().clone();
        if !source.is_playable() {
            return Err(ReeltextError::resource(format!(
                "video '{}' has unusable metadata ({}x{}, {}s)",
                source.title, source.width, source.height, source.duration_secs
            )));
        }

        if let Some(mut old) = self.player.take() {
            if let Err(e) = old.pause() {
                tracing::debug!(error = %e, "Failed to pause previous player");
            }
        }
        self.audio.release()?;
        self.store = OverlayStore::new(self.defaults.clone()).with_duration(source.duration_secs);
        self.drag.reset();
        self.export.reset()?;
        self.player = Some(player);
        self.update_layout();

        tracing::info!(
            title = %source.title,
            width = source.width,
            height = source.height,
            duration = source.duration_secs,
            "Video loaded"
        );
        Ok(())
    }

    pub fn source(&self) -> Option<&SourceVideo> {
        self.player.as_ref().map(|p| p.metadata())
    }

    pub fn store(&self) -> &OverlayStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut OverlayStore {
        &mut self.store
    }

    pub fn draw_rect(&self) -> DrawRect {
        self.rect
    }

    pub fn render_fps(&self) -> u32 {
        self.render_fps
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Current playback time, or zero without a video.
    pub fn current_time(&self) -> f64 {
        self.player.as_ref().map(|p| p.current_time()).unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().map(|p| p.is_playing()).unwrap_or(false)
    }

    /// Resize the drawing surface. The surface is also assumed to sit at the
    /// origin of pointer space until [`set_surface_bounds`](Self::set_surface_bounds) says otherwise.
    pub fn resize(&mut self, layout: Size, pixel_ratio: f64) {
        self.surface.resize(SurfaceMetrics::new(layout, pixel_ratio));
        self.bounds = SurfaceBounds::new(self.bounds.left, self.bounds.top, layout.width, layout.height);
        self.update_layout();
    }

    pub fn set_surface_bounds(&mut self, bounds: SurfaceBounds) {
        self.bounds = bounds;
    }

    fn update_layout(&mut self) {
        let video = self.source().map(|s| s.size()).unwrap_or_default();
        self.rect = DrawRect::contain(self.surface.size(), video);
        tracing::debug!(rect = ?self.rect, "Draw rectangle updated");
    }

    /// Start playback. This is the user gesture that connects the audio graph.
    pub fn play(&mut self) -> ReeltextResult<()> {
        self.ensure_live()?;
        let player = self
            .player
            .as_mut()
            .ok_or_else(|| ReeltextError::state("no video loaded"))?;
        self.audio.ensure_connected(player.metadata())?;
        player.play()
    }

    pub fn pause(&mut self) -> ReeltextResult<()> {
        self.player_mut()?.pause()
    }

    /// Seek playback. Rejected while an export is recording.
    pub fn seek(&mut self, secs: f64) -> ReeltextResult<()> {
        if self.export.state().is_active() {
            return Err(ReeltextError::state("seeking is disabled while exporting"));
        }
        let player = self.player_mut()?;
        let duration = player.metadata().duration_secs;
        let target = if secs.is_finite() {
            secs.clamp(0.0, duration)
        } else {
            0.0
        };
        player.seek(target)
    }

    fn player_mut(&mut self) -> ReeltextResult<&mut Box<dyn MediaPlayer>> {
        self.player
            .as_mut()
            .ok_or_else(|| ReeltextError::state("no video loaded"))
    }

    fn ensure_live(&self) -> ReeltextResult<()> {
        if self.torn_down {
            return Err(ReeltextError::state("session has been torn down"));
        }
        Ok(())
    }

    /// Add an overlay at the current playback time.
    pub fn add_overlay(&mut self) -> ReeltextResult<OverlayId> {
        let now = self.current_time();
        Ok(self.store.add_at(now)?)
    }

    /// Apply an edit command to the overlay store.
    pub fn apply(&mut self, command: &EditCommand) -> ReeltextResult<Option<OverlayId>> {
        self.store.apply(command).map_err(ReeltextError::from)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        self.drag.pointer_down(&self.store, &self.bounds, x, y)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<Position> {
        self.drag.pointer_move(&mut self.store, &self.bounds, x, y)
    }

    pub fn pointer_up(&mut self) -> Option<OverlayId> {
        self.drag.pointer_up()
    }

    /// One frame: drain playback events, composite, and feed the recorder.
    pub fn tick(&mut self) -> FrameStats {
        if self.torn_down {
            return FrameStats::default();
        }

        let events = self
            .player
            .as_mut()
            .map(|p| p.poll_events())
            .unwrap_or_default();
        for event in &events {
            match event {
                PlaybackEvent::Ended => tracing::debug!("Playback ended"),
                PlaybackEvent::Error { message } => {
                    tracing::warn!(error = %message, "Playback error")
                }
            }
            self.export.handle_playback_event(event);
        }

        let media_secs = self.current_time();
        let time = FrameTime::new(media_secs, self.clock.elapsed_secs());
        let input = FrameInput {
            overlays: self.store.as_slice(),
            time,
            rect: self.rect,
            video: self.player.as_ref().and_then(|p| p.current_frame()),
        };
        let stats = self.renderer.render_frame(self.surface.as_mut(), &input);

        self.export.capture_frame(self.surface.as_ref(), media_secs);

        self.last_stats = stats;
        self.frames += 1;
        stats
    }

    /// Start exporting the composited preview.
    pub fn start_export(&mut self) -> ReeltextResult<()> {
        self.ensure_live()?;
        let player = self
            .player
            .as_deref_mut()
            .ok_or_else(|| ReeltextError::state("no video loaded"))?;
        self.export.start(ExportContext {
            player,
            audio: &self.audio,
            surface: self.surface.as_ref(),
        })
    }

    pub fn cancel_export(&mut self) -> bool {
        match self.player.as_deref_mut() {
            Some(player) => self.export.cancel(player),
            None => false,
        }
    }

    /// Return a finished export to idle so another can start.
    pub fn reset_export(&mut self) -> ReeltextResult<()> {
        self.export.reset()
    }

    pub fn set_export_progress_callback(&mut self, callback: ProgressCallback) {
        self.export.set_progress_callback(callback);
    }

    pub fn export_state(&self) -> ExportState {
        self.export.state()
    }

    pub fn export_progress(&self) -> ExportProgress {
        self.export.progress()
    }

    pub fn export_failure(&self) -> Option<&ExportFailure> {
        self.export.failure()
    }

    pub fn export_summary(&self) -> Option<&ExportSummary> {
        self.export.summary()
    }

    pub fn audio_connected(&self) -> bool {
        self.audio.is_connected()
    }

    /// Release every session resource. Idempotent.
    pub fn teardown(&mut self) -> ReeltextResult<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        self.cancel_export();
        if let Some(player) = self.player.as_mut() {
            if let Err(e) = player.pause() {
                tracing::debug!(error = %e, "Failed to pause player during teardown");
            }
        }
        self.drag.reset();
        self.audio.release()?;
        tracing::info!(frames = self.frames, "Editor session torn down");
        Ok(())
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

/// Drive `session` with the render loop at its configured rate.
///
/// Ticks that find the session already borrowed are skipped. Cancel the
/// returned handle before tearing the session down.
pub fn spawn_session_loop(session: Rc<RefCell<EditorSession>>) -> LoopHandle {
    let fps = session.borrow().render_fps();
    RenderLoop::spawn(fps, move |_| match session.try_borrow_mut() {
        Ok(mut s) => {
            s.tick();
        }
        Err(_) => tracing::trace!("Session busy; frame skipped"),
    })
}
