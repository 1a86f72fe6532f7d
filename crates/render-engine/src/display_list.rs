//! A surface that records draw calls instead of producing pixels.

use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::layout::{DrawRect, Size, SurfaceMetrics};
use reeltext_overlay_model::style::Color;
use serde::Serialize;

use crate::surface::{FontSpec, Surface, VideoFrame};

/// Character advance of the recording surface, as a fraction of font size.
pub const ADVANCE_RATIO: f64 = 0.6;

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear {
        color: Color,
    },
    Video {
        width: u32,
        height: u32,
        rect: DrawRect,
    },
    Save,
    Restore,
    Clip {
        rect: DrawRect,
    },
    Translate {
        dx: f64,
        dy: f64,
    },
    Scale {
        factor: f64,
    },
    Alpha {
        alpha: f64,
    },
    Font {
        font: FontSpec,
    },
    FillRect {
        rect: DrawRect,
        color: Color,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        color: Color,
    },
    StrokeLine {
        from: (f64, f64),
        to: (f64, f64),
        width: f64,
        color: Color,
    },
}

#[derive(Debug, Clone)]
struct State {
    font: Option<FontSpec>,
    alpha: f64,
}

/// Records every call; text is measured with a fixed per-character advance.
#[derive(Debug, Clone)]
pub struct DisplayList {
    metrics: SurfaceMetrics,
    commands: Vec<DrawCommand>,
    state: State,
    stack: Vec<State>,
}

impl DisplayList {
    pub fn new(size: Size) -> Self {
        Self {
            metrics: SurfaceMetrics::new(size, 1.0),
            commands: Vec::new(),
            state: State {
                font: None,
                alpha: 1.0,
            },
            stack: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the list empty.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Text of every `FillText` call, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn alpha(&self) -> f64 {
        self.state.alpha
    }

    /// Depth of the save stack; zero after balanced drawing.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn current_font(&self) -> ReeltextResult<&FontSpec> {
        self.state
            .font
            .as_ref()
            .ok_or_else(|| ReeltextError::render("no font set before text operation"))
    }
}

impl Surface for DisplayList {
    fn size(&self) -> Size {
        self.metrics.layout
    }

    fn resize(&mut self, metrics: SurfaceMetrics) {
        self.metrics = metrics;
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear { color });
    }

    fn draw_video_frame(&mut self, frame: &VideoFrame, rect: &DrawRect) {
        self.commands.push(DrawCommand::Video {
            width: frame.width,
            height: frame.height,
            rect: *rect,
        });
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
            self.commands.push(DrawCommand::Restore);
        }
    }

    fn clip_rect(&mut self, rect: &DrawRect) {
        self.commands.push(DrawCommand::Clip { rect: *rect });
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.commands.push(DrawCommand::Translate { dx, dy });
    }

    fn scale(&mut self, factor: f64) {
        self.commands.push(DrawCommand::Scale { factor });
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
        self.commands.push(DrawCommand::Alpha {
            alpha: self.state.alpha,
        });
    }

    fn set_font(&mut self, font: &FontSpec) -> ReeltextResult<()> {
        self.state.font = Some(font.clone());
        self.commands.push(DrawCommand::Font { font: font.clone() });
        Ok(())
    }

    fn measure_text(&mut self, text: &str) -> ReeltextResult<f64> {
        let font = self.current_font()?;
        Ok(text.chars().count() as f64 * font.size * ADVANCE_RATIO)
    }

    fn fill_rect(&mut self, rect: &DrawRect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect: *rect, color });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) -> ReeltextResult<()> {
        self.current_font()?;
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            color,
        });
        Ok(())
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), width: f64, color: Color) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            width,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reeltext_overlay_model::style::FontWeight;

    fn font(size: f64) -> FontSpec {
        FontSpec {
            family: "sans-serif".to_string(),
            size,
            weight: FontWeight::Normal,
            italic: false,
        }
    }

    #[test]
    fn test_measure_uses_fixed_advance() {
        let mut list = DisplayList::new(Size::new(100.0, 100.0));
        list.set_font(&font(10.0)).unwrap();
        assert!((list.measure_text("abcd").unwrap() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_without_font_fails() {
        let mut list = DisplayList::new(Size::new(100.0, 100.0));
        assert!(list.measure_text("x").is_err());
        assert!(list.fill_text("x", 0.0, 0.0, Color::WHITE).is_err());
    }

    #[test]
    fn test_restore_brings_back_font_and_alpha() {
        let mut list = DisplayList::new(Size::new(100.0, 100.0));
        list.set_font(&font(10.0)).unwrap();
        list.save();
        list.set_alpha(0.25);
        list.set_font(&font(20.0)).unwrap();
        list.restore();
        assert_eq!(list.alpha(), 1.0);
        assert!((list.measure_text("a").unwrap() - 6.0).abs() < 1e-9);
        list.restore();
        assert_eq!(list.depth(), 0);
    }

    #[test]
    fn test_commands_serialize_with_tag() {
        let mut list = DisplayList::new(Size::new(100.0, 100.0));
        list.clip_rect(&DrawRect::new(0.0, 0.0, 10.0, 10.0));
        let json = serde_json::to_string(list.commands()).unwrap();
        assert!(json.contains(r#""cmd":"clip""#));
    }
}
