//! Render a single composited frame.

use std::path::PathBuf;

use anyhow::Context;
use image::{ImageFormat, RgbaImage};
use reeltext_common::config::AppConfig;
use reeltext_common::ReeltextError;
use reeltext_media_engine::{grab_frame, probe_video};
use reeltext_overlay_model::layout::{DrawRect, SurfaceMetrics};
use reeltext_overlay_model::store::OverlayStore;
use reeltext_render_engine::{
    DisplayList, FontBook, FrameInput, FrameRenderer, FrameTime, RasterSurface, RenderOptions,
    Surface,
};

use super::{apply_edits, load_edits, parse_size};

pub fn run(
    config: &AppConfig,
    video: PathBuf,
    edits: Option<PathBuf>,
    at: f64,
    size: Option<String>,
    out: Option<PathBuf>,
    display_list: bool,
) -> anyhow::Result<()> {
    if out.is_none() && !display_list {
        anyhow::bail!("Choose an output: --out <file.png> or --display-list");
    }

    let source = probe_video(&video)
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", video.display()))?;
    let size = match size {
        Some(s) => parse_size(&s)?,
        None => source.size(),
    };

    let mut store = OverlayStore::new(config.editor.clone()).with_duration(source.duration_secs);
    let edits = load_edits(edits.as_deref())?;
    apply_edits(&edits, |command| store.apply(command).map_err(ReeltextError::from))?;

    let at = at.clamp(0.0, source.duration_secs);
    let picture = match grab_frame(&source, at) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, "Rendering without the video picture");
            None
        }
    };

    let renderer = FrameRenderer::new(RenderOptions::from_settings(&config.render)?);
    let input = FrameInput {
        overlays: store.as_slice(),
        time: FrameTime::at(at),
        rect: DrawRect::contain(size, source.size()),
        video: picture.as_ref(),
    };

    if display_list {
        let mut surface = DisplayList::new(size);
        let stats = renderer.render_frame(&mut surface, &input);
        tracing::debug!(stats = ?stats, "Frame recorded");
        println!("{}", serde_json::to_string_pretty(surface.commands())?);
        return Ok(());
    }

    let metrics = SurfaceMetrics::new(size, config.render.pixel_ratio);
    let mut surface = RasterSurface::new(metrics, FontBook::from_settings(&config.render));
    let stats = renderer.render_frame(&mut surface, &input);
    if stats.overlays_failed > 0 {
        eprintln!("Warning: {} overlay(s) failed to draw", stats.overlays_failed);
    }

    let snapshot = surface
        .snapshot()
        .context("Raster surface produced no pixels")?;
    let (width, height) = (snapshot.width, snapshot.height);
    let image = RgbaImage::from_raw(width, height, snapshot.pixels)
        .context("Snapshot size does not match its pixel buffer")?;

    if let Some(out) = out {
        image
            .save_with_format(&out, ImageFormat::Png)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        println!(
            "Frame at {at:.3}s written to {} ({width}x{height}, {} overlay(s) drawn)",
            out.display(),
            stats.overlays_drawn
        );
    }
    Ok(())
}
