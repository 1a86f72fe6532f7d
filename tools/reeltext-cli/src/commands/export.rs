//! Export the composited video in real time.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use reeltext_common::config::AppConfig;
use reeltext_media_engine::{DirectoryDownloadSink, FfmpegAudioBackend, FfmpegCapture, FfmpegPlayer};
use reeltext_overlay_model::layout::SurfaceMetrics;
use reeltext_render_engine::{
    spawn_session_loop, EditorSession, ExportProgress, ExportState, FontBook, MediaPlayer,
    RasterSurface, SessionParts,
};

use super::{apply_edits, load_edits, parse_size};

/// Extra wall time allowed beyond the video's duration before giving up.
const DEADLINE_SLACK: Duration = Duration::from_secs(30);

pub async fn run(
    config: AppConfig,
    video: PathBuf,
    edits: Option<PathBuf>,
    size: Option<String>,
    title: Option<String>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Exporting: {}", video.display());

    let mut player = FfmpegPlayer::open(&video)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", video.display()))?;
    if let Some(title) = title {
        player.set_title(title);
    }
    let source = player.metadata().clone();
    let size = match size {
        Some(s) => parse_size(&s)?,
        None => source.size(),
    };
    let output_dir = out.unwrap_or_else(|| config.export.output_dir.clone());

    println!("  Output dir: {}", output_dir.display());
    println!("  Container: {}", config.export.mime_type);
    println!("  Surface: {}x{}", size.width, size.height);
    println!("  Duration: {:.1}s (export runs in real time)", source.duration_secs);

    let metrics = SurfaceMetrics::new(size, config.render.pixel_ratio);
    let parts = SessionParts {
        surface: Box::new(RasterSurface::new(metrics, FontBook::from_settings(&config.render))),
        audio: Box::new(FfmpegAudioBackend::new()),
        capture: Box::new(FfmpegCapture::new()),
        sink: Box::new(DirectoryDownloadSink::new(output_dir)),
    };
    let mut session = EditorSession::new(&config, parts)?;
    session.load_video(Box::new(player))?;
    let edits = load_edits(edits.as_deref())?;
    apply_edits(&edits, |command| session.apply(command))?;
    println!("  Overlays: {}", session.store().len());

    session.set_export_progress_callback(Box::new(print_progress));

    // Starting playback is the gesture that connects the audio graph.
    session.play()?;
    if let Err(e) = session.start_export() {
        let _ = session.teardown();
        anyhow::bail!("Export could not start: {e}");
    }

    let session = Rc::new(RefCell::new(session));
    let deadline = Duration::from_secs_f64(source.duration_secs) + DEADLINE_SLACK;
    let local = tokio::task::LocalSet::new();
    let state = local.run_until(drive(session.clone(), deadline)).await;

    let mut session = session.borrow_mut();
    session.teardown()?;
    println!();

    match state {
        ExportState::Done => {
            if let Some(summary) = session.export_summary() {
                println!(
                    "Export complete: {} ({} bytes, {} frames)",
                    summary.location, summary.size_bytes, summary.frames
                );
            }
            Ok(())
        }
        _ => match session.export_failure() {
            Some(failure) => anyhow::bail!("Export failed: {failure}"),
            None => anyhow::bail!("Export ended in state {state:?}"),
        },
    }
}

/// Run the render loop until the export reaches a terminal state.
async fn drive(session: Rc<RefCell<EditorSession>>, deadline: Duration) -> ExportState {
    let handle = spawn_session_loop(session.clone());
    let started = Instant::now();
    let mut poll = tokio::time::interval(Duration::from_millis(100));

    let state = loop {
        tokio::select! {
            _ = poll.tick() => {
                let state = session.borrow().export_state();
                if state.is_terminal() {
                    break state;
                }
                if started.elapsed() > deadline {
                    tracing::warn!(elapsed = ?started.elapsed(), "Playback never ended; cancelling export");
                    session.borrow_mut().cancel_export();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nCancelling export...");
                session.borrow_mut().cancel_export();
            }
        }
    };

    if let Some(join) = handle.cancel() {
        match join.await {
            Ok(frames) => tracing::debug!(frames, "Render loop stopped"),
            Err(e) => tracing::warn!(error = %e, "Render loop task failed"),
        }
    }
    state
}

fn print_progress(p: &ExportProgress) {
    print!(
        "\r  Progress: {:>5.1}% ({:.1}/{:.1}s, {:?})  ",
        p.fraction * 100.0,
        p.elapsed_secs,
        p.duration_secs,
        p.state,
    );
    let _ = std::io::stdout().flush();
}
