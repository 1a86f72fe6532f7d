//! Overlay records and partial patches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;
use crate::style::{Color, FontWeight, TextStyle};

/// Stable identifier of an overlay within one editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point in percentage space of the video-content area.
///
/// `(0, 0)` is the top-left corner of the video picture, `(100, 100)` the
/// bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const CENTER: Position = Position { x: 50.0, y: 50.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into `[0, 100]`. NaN collapses to 0.
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: clamp_percent(x),
            y: clamp_percent(y),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Clamp a percentage into `[0, 100]`.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Motion/opacity treatment applied during an overlay's visible window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationKind {
    #[default]
    None,
    FadeIn,
    FadeOut,
    FadeInOut,
    SlideLeft,
    SlideRight,
    ZoomIn,
    Floating,
    Ticker,
}

impl AnimationKind {
    pub const ALL: [AnimationKind; 9] = [
        AnimationKind::None,
        AnimationKind::FadeIn,
        AnimationKind::FadeOut,
        AnimationKind::FadeInOut,
        AnimationKind::SlideLeft,
        AnimationKind::SlideRight,
        AnimationKind::ZoomIn,
        AnimationKind::Floating,
        AnimationKind::Ticker,
    ];

    /// Floating overlays have a computed position and cannot be dragged.
    pub fn is_draggable(&self) -> bool {
        !matches!(self, AnimationKind::Floating)
    }
}

/// A timed, styled text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,

    /// Text content; `\n` separates lines.
    pub text: String,

    /// Window start in seconds of media time.
    pub start_secs: f64,

    /// Window end in seconds of media time.
    pub end_secs: f64,

    pub style: TextStyle,

    pub position: Position,

    pub animation: AnimationKind,

    /// Length of the enter/exit phase in seconds.
    pub animation_duration_secs: f64,
}

impl Overlay {
    /// Length of the visible window. Non-positive for degenerate overlays.
    pub fn window_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Whether the overlay is shown at `now`. Both window edges are inclusive;
    /// degenerate windows are never visible.
    pub fn is_visible(&self, now: f64) -> bool {
        self.window_secs() > 0.0 && now >= self.start_secs && now <= self.end_secs
    }

    /// Check the window and animation invariants.
    ///
    /// `duration_secs` is the source video length when known.
    pub fn validate(&self, duration_secs: Option<f64>) -> Result<(), OverlayError> {
        let window_ok = self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.start_secs < self.end_secs
            && duration_secs.map_or(true, |d| self.end_secs <= d + 1e-9);
        if !window_ok {
            return Err(OverlayError::InvalidWindow {
                start_secs: self.start_secs,
                end_secs: self.end_secs,
            });
        }
        if !(self.animation_duration_secs.is_finite() && self.animation_duration_secs > 0.0) {
            return Err(OverlayError::InvalidAnimationDuration {
                secs: self.animation_duration_secs,
            });
        }
        Ok(())
    }

    /// Bring fields into range: positions and opacity are clamped and the
    /// animation duration is capped at the window length.
    pub fn normalize(&mut self) -> Result<(), OverlayError> {
        self.style.normalize()?;
        self.position = Position::clamped(self.position.x, self.position.y);
        let window = self.window_secs();
        if window > 0.0 && self.animation_duration_secs > window {
            self.animation_duration_secs = window;
        }
        Ok(())
    }
}

/// A partial update. Unset fields leave the overlay untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayPatch {
    pub text: Option<String>,
    pub start_secs: Option<f64>,
    pub end_secs: Option<f64>,
    pub position: Option<Position>,
    pub animation: Option<AnimationKind>,
    pub animation_duration_secs: Option<f64>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub font_weight: Option<FontWeight>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub color: Option<Color>,
    pub background: Option<Color>,
    pub letter_spacing: Option<f64>,
    pub line_height: Option<f64>,
    pub opacity: Option<f64>,
}

impl OverlayPatch {
    pub fn is_empty(&self) -> bool {
        *self == OverlayPatch::default()
    }

    /// Write every set field into `overlay`.
    pub fn apply_to(&self, overlay: &mut Overlay) {
        if let Some(text) = &self.text {
            overlay.text = text.clone();
        }
        if let Some(v) = self.start_secs {
            overlay.start_secs = v;
        }
        if let Some(v) = self.end_secs {
            overlay.end_secs = v;
        }
        if let Some(v) = self.position {
            overlay.position = v;
        }
        if let Some(v) = self.animation {
            overlay.animation = v;
        }
        if let Some(v) = self.animation_duration_secs {
            overlay.animation_duration_secs = v;
        }

        let style = &mut overlay.style;
        if let Some(v) = self.font_size {
            style.font_size = v;
        }
        if let Some(v) = &self.font_family {
            style.font_family = v.clone();
        }
        if let Some(v) = self.font_weight {
            style.font_weight = v;
        }
        if let Some(v) = self.italic {
            style.italic = v;
        }
        if let Some(v) = self.underline {
            style.underline = v;
        }
        if let Some(v) = self.color {
            style.color = v;
        }
        if let Some(v) = self.background {
            style.background = v;
        }
        if let Some(v) = self.letter_spacing {
            style.letter_spacing = v;
        }
        if let Some(v) = self.line_height {
            style.line_height = v;
        }
        if let Some(v) = self.opacity {
            style.opacity = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(start: f64, end: f64) -> Overlay {
        Overlay {
            id: OverlayId(1),
            text: "Hello".to_string(),
            start_secs: start,
            end_secs: end,
            style: TextStyle::default(),
            position: Position::CENTER,
            animation: AnimationKind::None,
            animation_duration_secs: 1.0,
        }
    }

    #[test]
    fn test_visibility_edges_are_inclusive() {
        let o = overlay(2.0, 5.0);
        assert!(!o.is_visible(1.999));
        assert!(o.is_visible(2.0));
        assert!(o.is_visible(5.0));
        assert!(!o.is_visible(5.001));
    }

    #[test]
    fn test_degenerate_window_never_visible() {
        let o = overlay(3.0, 3.0);
        assert!(!o.is_visible(3.0));
        assert!(o.validate(None).is_err());
    }

    #[test]
    fn test_validate_against_duration() {
        let o = overlay(1.0, 12.0);
        assert!(o.validate(Some(10.0)).is_err());
        assert!(o.validate(Some(12.0)).is_ok());
    }

    #[test]
    fn test_normalize_caps_animation_duration() {
        let mut o = overlay(0.0, 0.5);
        o.animation_duration_secs = 2.0;
        o.position = Position::new(140.0, -3.0);
        o.normalize().unwrap();
        assert!((o.animation_duration_secs - 0.5).abs() < 1e-12);
        assert_eq!(o.position, Position::new(100.0, 0.0));
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut o = overlay(0.0, 3.0);
        let patch: OverlayPatch = serde_json::from_str(
            r##"{"text":"Bye","animation":"fade-in-out","background":"#000000","opacity":40}"##,
        )
        .unwrap();
        patch.apply_to(&mut o);
        assert_eq!(o.text, "Bye");
        assert_eq!(o.animation, AnimationKind::FadeInOut);
        assert_eq!(o.style.background, Color::BLACK);
        assert_eq!(o.style.opacity, 40.0);
        assert_eq!(o.style.font_size, 32.0);
        assert_eq!(o.end_secs, 3.0);
    }

    #[test]
    fn test_animation_kind_serde_names() {
        let json = serde_json::to_string(&AnimationKind::SlideRight).unwrap();
        assert_eq!(json, "\"slide-right\"");
        assert!(!AnimationKind::Floating.is_draggable());
        assert!(AnimationKind::Ticker.is_draggable());
    }
}
