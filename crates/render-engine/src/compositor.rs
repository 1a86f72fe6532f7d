//! Frame compositor: paints the video picture and every visible overlay.
//!
//! Each frame is built from scratch: clear, letterboxed video, then overlays
//! in store order. Every overlay draw runs inside its own `save`/`restore`
//! pair with the surface clipped to the draw rectangle, so one broken overlay
//! cannot leak state into the next or abort the frame.

use reeltext_common::config::RenderSettings;
use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::layout::DrawRect;
use reeltext_overlay_model::overlay::Overlay;
use reeltext_overlay_model::style::{Color, TextStyle};

use crate::animation::{evaluate, AnimationState, FrameTime, TickerPath, Transform};
use crate::surface::{FontSpec, Surface, VideoFrame};

/// Smallest spacing between ticker copies, in layout pixels.
const MIN_TICKER_STEP_PX: f64 = 1.0;

/// Renderer settings resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Letterbox color painted before the video.
    pub background: Color,

    /// Padding around text background boxes, in layout pixels.
    pub text_padding: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            text_padding: 8.0,
        }
    }
}

impl RenderOptions {
    pub fn from_settings(settings: &RenderSettings) -> ReeltextResult<Self> {
        let background = settings.background.parse::<Color>().map_err(|e| {
            ReeltextError::config(format!("render.background: {e}"))
        })?;
        Ok(Self {
            background,
            text_padding: settings.text_padding_px.max(0.0),
        })
    }
}

/// Everything one frame depends on.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub overlays: &'a [Overlay],
    pub time: FrameTime,
    pub rect: DrawRect,
    pub video: Option<&'a VideoFrame>,
}

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub video_drawn: bool,
    pub overlays_drawn: usize,
    pub overlays_failed: usize,
}

/// Stateless frame painter.
#[derive(Debug, Clone, Default)]
pub struct FrameRenderer {
    options: RenderOptions,
}

impl FrameRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Composite one frame onto `surface`.
    pub fn render_frame(&self, surface: &mut dyn Surface, input: &FrameInput<'_>) -> FrameStats {
        let mut stats = FrameStats::default();
        surface.clear(self.options.background);

        if input.rect.is_empty() {
            tracing::trace!("Empty draw rectangle; frame left blank");
            return stats;
        }

        if let Some(frame) = input.video {
            surface.draw_video_frame(frame, &input.rect);
            stats.video_drawn = true;
        }

        for overlay in input
            .overlays
            .iter()
            .filter(|o| o.is_visible(input.time.media_secs))
        {
            surface.save();
            surface.clip_rect(&input.rect);
            let result = self.draw_overlay(surface, overlay, input.time, &input.rect);
            surface.restore();

            match result {
                Ok(true) => stats.overlays_drawn += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(overlay_id = %overlay.id, error = %e, "Overlay draw failed");
                    stats.overlays_failed += 1;
                }
            }
        }

        stats
    }

    fn draw_overlay(
        &self,
        surface: &mut dyn Surface,
        overlay: &Overlay,
        time: FrameTime,
        rect: &DrawRect,
    ) -> ReeltextResult<bool> {
        match evaluate(overlay, time, rect) {
            None => Ok(false),
            Some(AnimationState::Standard(transform)) => {
                self.draw_standard(surface, overlay, &transform, rect)?;
                Ok(true)
            }
            Some(AnimationState::Ticker(path)) => {
                self.draw_ticker(surface, overlay, &path, rect)?;
                Ok(true)
            }
        }
    }

    /// Multi-line text centered on the overlay anchor.
    fn draw_standard(
        &self,
        surface: &mut dyn Surface,
        overlay: &Overlay,
        transform: &Transform,
        rect: &DrawRect,
    ) -> ReeltextResult<()> {
        let style = &overlay.style;
        surface.set_alpha(transform.opacity);
        surface.set_font(&FontSpec::from_style(style))?;

        let (anchor_x, anchor_y) = rect.point_at(overlay.position);
        surface.translate(
            anchor_x + transform.translate_x,
            anchor_y + transform.translate_y,
        );
        surface.scale(transform.scale);

        let lines: Vec<&str> = overlay.text.split('\n').collect();
        let widths = lines
            .iter()
            .map(|line| line_width(surface, line, style.letter_spacing))
            .collect::<ReeltextResult<Vec<f64>>>()?;

        let pitch = style.line_pitch();
        let first_y = -((lines.len() - 1) as f64) * pitch / 2.0;

        if !style.background.is_transparent() {
            let pad = self.options.text_padding;
            let max_width = widths.iter().copied().fold(0.0, f64::max);
            let block_height = lines.len() as f64 * pitch;
            surface.fill_rect(
                &DrawRect::new(
                    -max_width / 2.0 - pad,
                    -block_height / 2.0 - pad,
                    max_width + 2.0 * pad,
                    block_height + 2.0 * pad,
                ),
                style.background,
            );
        }

        for (i, (line, width)) in lines.iter().zip(&widths).enumerate() {
            let y = first_y + i as f64 * pitch;
            let left = -width / 2.0;
            draw_line(surface, line, left, y, style)?;
            if style.underline {
                underline(surface, left, *width, y, style);
            }
        }
        Ok(())
    }

    /// Horizontally scrolling single line across the draw rectangle.
    fn draw_ticker(
        &self,
        surface: &mut dyn Surface,
        overlay: &Overlay,
        path: &TickerPath,
        rect: &DrawRect,
    ) -> ReeltextResult<()> {
        let style = &overlay.style;
        surface.set_alpha(path.opacity);
        surface.set_font(&FontSpec::from_style(style))?;

        let text = overlay.text.split('\n').collect::<Vec<_>>().join(" ");
        let width = line_width(surface, &text, style.letter_spacing)?;
        let y = path.baseline_y;

        if !style.background.is_transparent() {
            let pad = self.options.text_padding;
            let pitch = style.line_pitch();
            surface.fill_rect(
                &DrawRect::new(rect.offset_x, y - pitch / 2.0 - pad, rect.width, pitch + 2.0 * pad),
                style.background,
            );
        }

        if !(width > 0.0) {
            return Ok(());
        }

        // Negative letter spacing can shrink the text to almost nothing; keep
        // the copy count bounded by the rectangle width.
        let step = (2.0 * width).max(MIN_TICKER_STEP_PX);
        let mut x = rect.offset_x - path.offset(width);
        while x < rect.right() {
            draw_line(surface, &text, x, y, style)?;
            if style.underline {
                underline(surface, x, width, y, style);
            }
            x += step;
        }
        Ok(())
    }
}

/// Width of one line including letter spacing between characters.
fn line_width(surface: &mut dyn Surface, line: &str, letter_spacing: f64) -> ReeltextResult<f64> {
    if letter_spacing == 0.0 {
        return surface.measure_text(line);
    }
    let mut width = 0.0;
    let mut count = 0usize;
    let mut buf = [0u8; 4];
    for ch in line.chars() {
        width += surface.measure_text(ch.encode_utf8(&mut buf))?;
        count += 1;
    }
    Ok(width + letter_spacing * count.saturating_sub(1) as f64)
}

fn draw_line(
    surface: &mut dyn Surface,
    line: &str,
    left: f64,
    y: f64,
    style: &TextStyle,
) -> ReeltextResult<()> {
    if style.letter_spacing == 0.0 {
        return surface.fill_text(line, left, y, style.color);
    }
    let mut x = left;
    let mut buf = [0u8; 4];
    for ch in line.chars() {
        let glyph = ch.encode_utf8(&mut buf);
        surface.fill_text(glyph, x, y, style.color)?;
        x += surface.measure_text(glyph)? + style.letter_spacing;
    }
    Ok(())
}

fn underline(surface: &mut dyn Surface, left: f64, width: f64, y: f64, style: &TextStyle) {
    let line_y = y + 0.5 * style.font_size;
    surface.stroke_line(
        (left, line_y),
        (left + width, line_y),
        (style.font_size / 16.0).max(1.0),
        style.color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_list::{DisplayList, DrawCommand};
    use crate::surface::FrameSnapshot;
    use reeltext_overlay_model::layout::{Size, SurfaceMetrics};
    use reeltext_overlay_model::overlay::{AnimationKind, OverlayId, Position};

    fn overlay(id: u64, text: &str, kind: AnimationKind) -> Overlay {
        Overlay {
            id: OverlayId(id),
            text: text.to_string(),
            start_secs: 0.0,
            end_secs: 10.0,
            style: TextStyle::default(),
            position: Position::CENTER,
            animation: kind,
            animation_duration_secs: 1.0,
        }
    }

    fn rect() -> DrawRect {
        DrawRect::new(0.0, 87.5, 400.0, 225.0)
    }

    fn render(overlays: &[Overlay], at: f64) -> (DisplayList, FrameStats) {
        let mut list = DisplayList::new(Size::new(400.0, 400.0));
        let input = FrameInput {
            overlays,
            time: FrameTime::at(at),
            rect: rect(),
            video: None,
        };
        let stats = FrameRenderer::default().render_frame(&mut list, &input);
        (list, stats)
    }

    fn text_positions(list: &DisplayList) -> Vec<(String, f64, f64)> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, x, y, .. } => Some((text.clone(), *x, *y)),
                _ => None,
            })
            .collect()
    }

    /// Fails every text draw whose text contains "boom".
    struct FailingSurface(DisplayList);

    impl Surface for FailingSurface {
        fn size(&self) -> Size {
            self.0.size()
        }
        fn resize(&mut self, metrics: SurfaceMetrics) {
            self.0.resize(metrics)
        }
        fn clear(&mut self, color: Color) {
            self.0.clear(color)
        }
        fn draw_video_frame(&mut self, frame: &VideoFrame, rect: &DrawRect) {
            self.0.draw_video_frame(frame, rect)
        }
        fn save(&mut self) {
            self.0.save()
        }
        fn restore(&mut self) {
            self.0.restore()
        }
        fn clip_rect(&mut self, rect: &DrawRect) {
            self.0.clip_rect(rect)
        }
        fn translate(&mut self, dx: f64, dy: f64) {
            self.0.translate(dx, dy)
        }
        fn scale(&mut self, factor: f64) {
            self.0.scale(factor)
        }
        fn set_alpha(&mut self, alpha: f64) {
            self.0.set_alpha(alpha)
        }
        fn set_font(&mut self, font: &FontSpec) -> ReeltextResult<()> {
            self.0.set_font(font)
        }
        fn measure_text(&mut self, text: &str) -> ReeltextResult<f64> {
            self.0.measure_text(text)
        }
        fn fill_rect(&mut self, rect: &DrawRect, color: Color) {
            self.0.fill_rect(rect, color)
        }
        fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) -> ReeltextResult<()> {
            if text.contains("boom") {
                return Err(ReeltextError::render("glyph cache exploded"));
            }
            self.0.fill_text(text, x, y, color)
        }
        fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), width: f64, color: Color) {
            self.0.stroke_line(from, to, width, color)
        }
        fn snapshot(&self) -> Option<FrameSnapshot> {
            None
        }
    }

    #[test]
    fn test_failing_overlay_does_not_abort_frame() {
        let overlays = vec![
            overlay(1, "boom", AnimationKind::None),
            overlay(2, "fine", AnimationKind::FadeIn),
        ];
        let mut surface = FailingSurface(DisplayList::new(Size::new(400.0, 400.0)));
        let input = FrameInput {
            overlays: &overlays,
            time: FrameTime::at(5.0),
            rect: rect(),
            video: None,
        };
        let stats = FrameRenderer::default().render_frame(&mut surface, &input);
        assert_eq!(stats.overlays_failed, 1);
        assert_eq!(stats.overlays_drawn, 1);
        assert_eq!(surface.0.depth(), 0);
        assert_eq!(surface.0.texts(), vec!["fine"]);
        assert_eq!(surface.0.alpha(), 1.0);
    }

    #[test]
    fn test_every_overlay_is_clipped_to_draw_rect() {
        let overlays = vec![
            overlay(1, "a", AnimationKind::None),
            overlay(2, "b", AnimationKind::Ticker),
        ];
        let (list, stats) = render(&overlays, 1.0);
        assert_eq!(stats.overlays_drawn, 2);
        let cmds = list.commands();
        let saves: Vec<usize> = cmds
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, DrawCommand::Save))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(saves.len(), 2);
        for i in saves {
            assert_eq!(cmds[i + 1], DrawCommand::Clip { rect: rect() });
        }
    }

    #[test]
    fn test_empty_rect_draws_nothing_but_clear() {
        let overlays = vec![overlay(1, "a", AnimationKind::None)];
        let mut list = DisplayList::new(Size::new(0.0, 0.0));
        let frame = VideoFrame::solid(2, 2, Color::WHITE);
        let input = FrameInput {
            overlays: &overlays,
            time: FrameTime::at(1.0),
            rect: DrawRect::EMPTY,
            video: Some(&frame),
        };
        let stats = FrameRenderer::default().render_frame(&mut list, &input);
        assert_eq!(stats, FrameStats::default());
        assert_eq!(list.commands().len(), 1);
    }

    #[test]
    fn test_video_is_painted_into_draw_rect() {
        let mut list = DisplayList::new(Size::new(400.0, 400.0));
        let frame = VideoFrame::solid(16, 9, Color::WHITE);
        let input = FrameInput {
            overlays: &[],
            time: FrameTime::at(0.0),
            rect: rect(),
            video: Some(&frame),
        };
        let stats = FrameRenderer::default().render_frame(&mut list, &input);
        assert!(stats.video_drawn);
        assert_eq!(
            list.commands()[1],
            DrawCommand::Video {
                width: 16,
                height: 9,
                rect: rect()
            }
        );
    }

    #[test]
    fn test_lines_stack_around_anchor() {
        let overlays = vec![overlay(1, "ab\ncdef", AnimationKind::None)];
        let (list, _) = render(&overlays, 1.0);
        let texts = text_positions(&list);
        // 32px font: advance 19.2 per char, pitch 38.4.
        assert_eq!(texts.len(), 2);
        assert!((texts[0].1 + 19.2).abs() < 1e-9);
        assert!((texts[0].2 + 19.2).abs() < 1e-9);
        assert!((texts[1].1 + 38.4).abs() < 1e-9);
        assert!((texts[1].2 - 19.2).abs() < 1e-9);
        assert!(list.commands().contains(&DrawCommand::Translate {
            dx: 200.0,
            dy: 200.0
        }));
    }

    #[test]
    fn test_background_box_and_underline() {
        let mut o = overlay(1, "abcd", AnimationKind::None);
        o.style.background = Color::BLACK;
        o.style.underline = true;
        o.style.font_size = 10.0;
        let (list, _) = render(&[o], 1.0);
        let cmds = list.commands();
        assert!(cmds.contains(&DrawCommand::FillRect {
            rect: DrawRect::new(-20.0, -14.0, 40.0, 28.0),
            color: Color::BLACK,
        }));
        assert!(cmds.contains(&DrawCommand::StrokeLine {
            from: (-12.0, 5.0),
            to: (12.0, 5.0),
            width: 1.0,
            color: Color::WHITE,
        }));
    }

    #[test]
    fn test_letter_spacing_draws_per_character() {
        let mut o = overlay(1, "abc", AnimationKind::None);
        o.style.font_size = 10.0;
        o.style.letter_spacing = 4.0;
        let (list, _) = render(&[o], 1.0);
        let texts = text_positions(&list);
        let xs: Vec<f64> = texts.iter().map(|t| t.1).collect();
        // width = 3 × 6 + 2 × 4 = 26
        assert_eq!(texts.len(), 3);
        assert!((xs[0] + 13.0).abs() < 1e-9);
        assert!((xs[1] + 3.0).abs() < 1e-9);
        assert!((xs[2] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_ticker_tiles_across_rect() {
        let mut o = overlay(1, "abc", AnimationKind::Ticker);
        o.style.font_size = 10.0;
        // width 18, step 36, travel 50 → offset 14
        let (list, _) = render(&[o], 0.5);
        let texts = text_positions(&list);
        assert!((texts[0].1 + 14.0).abs() < 1e-9);
        assert!((texts[1].1 - 22.0).abs() < 1e-9);
        assert!(texts.iter().all(|t| (t.2 - 290.0).abs() < 1e-9));
        assert!(texts.last().map(|t| t.1 < 400.0).unwrap_or(false));
        assert_eq!(texts.len(), 12);
    }

    #[test]
    fn test_ticker_copies_bounded_for_tiny_text() {
        let mut o = overlay(1, "ab", AnimationKind::Ticker);
        o.style.font_size = 10.0;
        // 2 × 6 − 11.999 leaves a width of 0.001
        o.style.letter_spacing = -11.999;
        let (list, stats) = render(&[o], 0.5);
        assert_eq!(stats.overlays_drawn, 1);
        let copies = text_positions(&list).len() / 2;
        assert!(copies <= (400.0 / MIN_TICKER_STEP_PX) as usize + 1, "{copies} copies");
    }

    #[test]
    fn test_hidden_overlays_are_skipped() {
        let mut o = overlay(1, "late", AnimationKind::None);
        o.start_secs = 5.0;
        let (list, stats) = render(&[o], 1.0);
        assert_eq!(stats.overlays_drawn, 0);
        assert!(list.texts().is_empty());
    }

    #[test]
    fn test_options_from_settings() {
        let settings = RenderSettings {
            background: "#112233".to_string(),
            ..RenderSettings::default()
        };
        let options = RenderOptions::from_settings(&settings).unwrap();
        assert_eq!(options.background, Color::rgb(0x11, 0x22, 0x33));
        let bad = RenderSettings {
            background: "nope".to_string(),
            ..RenderSettings::default()
        };
        assert!(RenderOptions::from_settings(&bad).is_err());
    }
}
