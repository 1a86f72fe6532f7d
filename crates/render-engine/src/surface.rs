//! The 2D drawing surface the frame renderer paints on.

use std::sync::Arc;

use reeltext_common::ReeltextResult;
use reeltext_overlay_model::layout::{DrawRect, Size, SurfaceMetrics};
use reeltext_overlay_model::style::{Color, FontWeight, TextStyle};
use serde::Serialize;

/// Font selection for text operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    pub family: String,
    /// Size in layout pixels.
    pub size: f64,
    pub weight: FontWeight,
    pub italic: bool,
}

impl FontSpec {
    pub fn from_style(style: &TextStyle) -> Self {
        Self {
            family: style.font_family.clone(),
            size: style.font_size,
            weight: style.font_weight,
            italic: style.italic,
        }
    }
}

/// One decoded video picture, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<Vec<u8>>,
}

impl VideoFrame {
    /// Wrap RGBA8 pixels. `None` if the buffer length does not match.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let rgba = color.to_rgba8();
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Pixels read back from a surface, in device pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A canvas-like drawing surface.
///
/// Coordinates are layout pixels. `translate` and `scale` compose onto the
/// current transform; `clip_rect` intersects with the current clip. All three,
/// plus alpha and font, are saved and restored as one state.
///
/// `fill_text` places the left edge of the text at `x` and its vertical
/// middle at `y`.
pub trait Surface {
    fn size(&self) -> Size;

    fn resize(&mut self, metrics: SurfaceMetrics);

    /// Reset every pixel to `color`, ignoring clip and transform.
    fn clear(&mut self, color: Color);

    /// Paint a video picture stretched to `rect`.
    fn draw_video_frame(&mut self, frame: &VideoFrame, rect: &DrawRect);

    fn save(&mut self);

    /// Pop the last saved state. Unbalanced calls are ignored.
    fn restore(&mut self);

    fn clip_rect(&mut self, rect: &DrawRect);

    fn translate(&mut self, dx: f64, dy: f64);

    fn scale(&mut self, factor: f64);

    /// Global alpha in `[0, 1]` applied to every following draw.
    fn set_alpha(&mut self, alpha: f64);

    fn set_font(&mut self, font: &FontSpec) -> ReeltextResult<()>;

    /// Advance width of `text` in the current font, in layout pixels.
    fn measure_text(&mut self, text: &str) -> ReeltextResult<f64>;

    fn fill_rect(&mut self, rect: &DrawRect, color: Color);

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) -> ReeltextResult<()>;

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), width: f64, color: Color);

    /// Read the composited pixels back. Surfaces that keep no pixels return `None`.
    fn snapshot(&self) -> Option<FrameSnapshot> {
        None
    }
}
