//! Software RGBA8 rasterizer implementing [`Surface`].

use std::rc::Rc;

use fontdue::Font;
use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::layout::{DrawRect, Size, SurfaceMetrics};
use reeltext_overlay_model::style::{Color, FontWeight};

use crate::fonts::FontBook;
use crate::surface::{FontSpec, FrameSnapshot, Surface, VideoFrame};

/// Horizontal shear applied to faux-italic glyphs.
const ITALIC_SHEAR: f64 = 0.2;

#[derive(Clone)]
struct ActiveFont {
    font: Rc<Font>,
    spec: FontSpec,
}

#[derive(Clone)]
struct RasterState {
    tx: f64,
    ty: f64,
    scale: f64,
    /// Clip in untransformed layout coordinates.
    clip: Option<DrawRect>,
    alpha: f64,
    font: Option<ActiveFont>,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            scale: 1.0,
            clip: None,
            alpha: 1.0,
            font: None,
        }
    }
}

impl RasterState {
    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.tx, y * self.scale + self.ty)
    }

    fn map_rect(&self, rect: &DrawRect) -> DrawRect {
        let (x, y) = self.map(rect.offset_x, rect.offset_y);
        DrawRect::new(x, y, rect.width * self.scale, rect.height * self.scale)
    }
}

/// Device-pixel bounds `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy)]
struct PixelSpan {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

/// CPU canvas with a save/restore state stack, translate plus uniform scale,
/// intersecting clips, and src-over blending.
pub struct RasterSurface {
    metrics: SurfaceMetrics,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    state: RasterState,
    stack: Vec<RasterState>,
    fonts: FontBook,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("metrics", &self.metrics)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.stack.len())
            .finish()
    }
}

impl RasterSurface {
    pub fn new(metrics: SurfaceMetrics, fonts: FontBook) -> Self {
        let mut surface = Self {
            metrics,
            width: 0,
            height: 0,
            pixels: Vec::new(),
            state: RasterState::default(),
            stack: Vec::new(),
            fonts,
        };
        surface.allocate();
        surface
    }

    /// Backing-store size in device pixels.
    pub fn device_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA at a device pixel; transparent outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let i = self.index(x as i64, y as i64);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    fn allocate(&mut self) {
        let (w, h) = self.metrics.backing_size();
        self.width = w;
        self.height = h;
        self.pixels = vec![0; w as usize * h as usize * 4];
        self.state = RasterState::default();
        self.stack.clear();
    }

    fn ratio(&self) -> f64 {
        self.metrics.pixel_ratio
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Device span covered by a layout rect after clipping.
    fn span(&self, rect: &DrawRect) -> Option<PixelSpan> {
        let mut rect = *rect;
        if let Some(clip) = &self.state.clip {
            rect = rect.intersect(clip);
        }
        if rect.is_empty() {
            return None;
        }
        let r = self.ratio();
        let span = PixelSpan {
            x0: ((rect.offset_x * r).round() as i64).max(0),
            y0: ((rect.offset_y * r).round() as i64).max(0),
            x1: ((rect.right() * r).round() as i64).min(self.width as i64),
            y1: ((rect.bottom() * r).round() as i64).min(self.height as i64),
        };
        (span.x1 > span.x0 && span.y1 > span.y0).then_some(span)
    }

    /// Whether a device pixel lies inside the current clip.
    fn in_clip(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        match &self.state.clip {
            None => true,
            Some(clip) => {
                let r = self.ratio();
                let (cx, cy) = ((x as f64 + 0.5) / r, (y as f64 + 0.5) / r);
                clip.contains(cx, cy)
            }
        }
    }

    fn blend(&mut self, x: i64, y: i64, rgb: [u8; 3], src_alpha: f64) {
        let sa = src_alpha.clamp(0.0, 1.0);
        if sa <= 0.0 {
            return;
        }
        let i = self.index(x, y);
        let da = self.pixels[i + 3] as f64 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        for c in 0..3 {
            let sc = rgb[c] as f64;
            let dc = self.pixels[i + c] as f64;
            self.pixels[i + c] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
        }
        self.pixels[i + 3] = (out_a * 255.0).round() as u8;
    }

    fn active_font(&self) -> ReeltextResult<&ActiveFont> {
        self.state
            .font
            .as_ref()
            .ok_or_else(|| ReeltextError::render("no font set before text operation"))
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> Size {
        self.metrics.layout
    }

    fn resize(&mut self, metrics: SurfaceMetrics) {
        self.metrics = metrics;
        self.allocate();
    }

    fn clear(&mut self, color: Color) {
        let rgba = color.to_rgba8();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    fn draw_video_frame(&mut self, frame: &VideoFrame, rect: &DrawRect) {
        if frame.width == 0 || frame.height == 0 {
            return;
        }
        let target = self.state.map_rect(rect);
        let Some(span) = self.span(&target) else {
            return;
        };
        let r = self.ratio();
        let alpha = self.state.alpha;
        for y in span.y0..span.y1 {
            let ly = (y as f64 + 0.5) / r;
            let v = ((ly - target.offset_y) / target.height * frame.height as f64).floor();
            let sy = (v.max(0.0) as u32).min(frame.height - 1);
            for x in span.x0..span.x1 {
                let lx = (x as f64 + 0.5) / r;
                let u = ((lx - target.offset_x) / target.width * frame.width as f64).floor();
                let sx = (u.max(0.0) as u32).min(frame.width - 1);
                let [pr, pg, pb, pa] = frame.pixel(sx, sy);
                self.blend(x, y, [pr, pg, pb], pa as f64 / 255.0 * alpha);
            }
        }
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn clip_rect(&mut self, rect: &DrawRect) {
        let mapped = self.state.map_rect(rect);
        self.state.clip = Some(match &self.state.clip {
            Some(clip) => clip.intersect(&mapped),
            None => mapped,
        });
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.state.tx += dx * self.state.scale;
        self.state.ty += dy * self.state.scale;
    }

    fn scale(&mut self, factor: f64) {
        if factor.is_finite() {
            self.state.scale *= factor;
        }
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.state.alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    fn set_font(&mut self, font: &FontSpec) -> ReeltextResult<()> {
        let loaded = self.fonts.resolve(&font.family)?;
        self.state.font = Some(ActiveFont {
            font: loaded,
            spec: font.clone(),
        });
        Ok(())
    }

    fn measure_text(&mut self, text: &str) -> ReeltextResult<f64> {
        let active = self.active_font()?;
        let px = active.spec.size as f32;
        Ok(text
            .chars()
            .map(|ch| active.font.metrics(ch, px).advance_width as f64)
            .sum())
    }

    fn fill_rect(&mut self, rect: &DrawRect, color: Color) {
        if color.is_transparent() {
            return;
        }
        let Some(span) = self.span(&self.state.map_rect(rect)) else {
            return;
        };
        let alpha = color.alpha_f64() * self.state.alpha;
        let rgb = [color.r, color.g, color.b];
        for y in span.y0..span.y1 {
            for x in span.x0..span.x1 {
                self.blend(x, y, rgb, alpha);
            }
        }
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) -> ReeltextResult<()> {
        let active = self.active_font()?.clone();
        if color.is_transparent() || text.is_empty() {
            return Ok(());
        }

        let r = self.ratio();
        let device_px = (active.spec.size * self.state.scale * r) as f32;
        if !(device_px.is_finite() && device_px > 0.0) {
            return Ok(());
        }

        let (lx, ly) = self.state.map(x, y);
        let (mut pen_x, middle_y) = (lx * r, ly * r);
        let baseline = match active.font.horizontal_line_metrics(device_px) {
            Some(lm) => middle_y + (lm.ascent + lm.descent) as f64 / 2.0,
            None => middle_y + device_px as f64 * 0.35,
        };

        let rgb = [color.r, color.g, color.b];
        let base_alpha = color.alpha_f64() * self.state.alpha;
        let shear = if active.spec.italic { ITALIC_SHEAR } else { 0.0 };
        let emboldens = match active.spec.weight {
            FontWeight::Bold => 1 + (device_px / 24.0) as i64,
            FontWeight::Normal => 0,
        };

        for ch in text.chars() {
            let (metrics, coverage) = active.font.rasterize(ch, device_px);
            let gx = pen_x.round() as i64 + metrics.xmin as i64;
            let gy = baseline.round() as i64 - (metrics.height as i64 + metrics.ymin as i64);
            for row in 0..metrics.height {
                let py = gy + row as i64;
                let skew = ((baseline - py as f64) * shear).round() as i64;
                for col in 0..metrics.width {
                    let c = coverage[row * metrics.width + col];
                    if c == 0 {
                        continue;
                    }
                    let a = c as f64 / 255.0 * base_alpha;
                    for bold in 0..=emboldens {
                        let px = gx + col as i64 + skew + bold;
                        if self.in_clip(px, py) {
                            self.blend(px, py, rgb, a);
                        }
                    }
                }
            }
            pen_x += metrics.advance_width as f64;
        }
        Ok(())
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), width: f64, color: Color) {
        if color.is_transparent() || !(width > 0.0) {
            return;
        }
        let r = self.ratio();
        let (ax, ay) = self.state.map(from.0, from.1);
        let (bx, by) = self.state.map(to.0, to.1);
        let (ax, ay, bx, by) = (ax * r, ay * r, bx * r, by * r);
        let half = width * self.state.scale * r / 2.0;

        let x0 = (ax.min(bx) - half).floor() as i64;
        let x1 = (ax.max(bx) + half).ceil() as i64;
        let y0 = (ay.min(by) - half).floor() as i64;
        let y1 = (ay.max(by) + half).ceil() as i64;

        let (dx, dy) = (bx - ax, by - ay);
        let len_sq = dx * dx + dy * dy;
        let alpha = color.alpha_f64() * self.state.alpha;
        let rgb = [color.r, color.g, color.b];

        for y in y0.max(0)..y1.min(self.height as i64) {
            for x in x0.max(0)..x1.min(self.width as i64) {
                let (cx, cy) = (x as f64 + 0.5, y as f64 + 0.5);
                let t = if len_sq > 0.0 {
                    (((cx - ax) * dx + (cy - ay) * dy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (qx, qy) = (ax + t * dx, ay + t * dy);
                let dist = ((cx - qx).powi(2) + (cy - qy).powi(2)).sqrt();
                if dist <= half && self.in_clip(x, y) {
                    self.blend(x, y, rgb, alpha);
                }
            }
        }
    }

    fn snapshot(&self) -> Option<FrameSnapshot> {
        Some(FrameSnapshot {
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
        })
    }
}
