//! Per-overlay animation state as a pure function of time.
//!
//! Nothing here touches a surface or a player: [`evaluate`] maps an overlay,
//! a [`FrameTime`], and the current [`DrawRect`] to a visual transform, so
//! every animation can be tested by injecting fixed times.

use std::f64::consts::TAU;

use reeltext_overlay_model::layout::DrawRect;
use reeltext_overlay_model::overlay::{AnimationKind, Overlay};

/// Fraction of the draw-rectangle width a slide starts away from its target.
pub const SLIDE_DISTANCE_FRACTION: f64 = 0.25;

/// Scale a zoom-in overlay starts at.
pub const ZOOM_START_SCALE: f64 = 0.8;

/// Vertical amplitude of the floating oscillation, in layout pixels.
pub const FLOAT_AMPLITUDE_PX: f64 = 10.0;

/// Horizontal ticker speed in layout pixels per second.
pub const TICKER_SPEED_PX_PER_SEC: f64 = 100.0;

/// Ticker baseline as a fraction of the draw-rectangle height.
pub const TICKER_BASELINE_FRACTION: f64 = 0.9;

/// Time inputs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Video current time; drives visibility and window progress.
    pub media_secs: f64,

    /// Monotonic session clock; drives the continuous kinds so they keep
    /// moving while playback is paused.
    pub clock_secs: f64,
}

impl FrameTime {
    pub fn new(media_secs: f64, clock_secs: f64) -> Self {
        Self {
            media_secs,
            clock_secs,
        }
    }

    /// Both clocks at the same instant.
    pub fn at(secs: f64) -> Self {
        Self::new(secs, secs)
    }
}

/// Transform for every kind except the ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Final opacity in `[0, base]`, as a fraction.
    pub opacity: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    /// Uniform scale about the overlay anchor.
    pub scale: f64,
}

impl Transform {
    pub fn identity(opacity: f64) -> Self {
        Self {
            opacity,
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
        }
    }
}

/// Scrolling path of a ticker overlay. Position and animation duration of
/// the overlay do not participate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerPath {
    pub opacity: f64,

    /// Distance scrolled so far, `clock × speed`.
    pub travel_px: f64,

    /// Absolute vertical center of the ticker line.
    pub baseline_y: f64,
}

impl TickerPath {
    /// Scroll offset for text of the given measured width:
    /// `travel mod (2 × width)`.
    pub fn offset(&self, text_width: f64) -> f64 {
        if !(text_width.is_finite() && text_width > 0.0) {
            return 0.0;
        }
        self.travel_px.rem_euclid(2.0 * text_width)
    }
}

/// Output of the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationState {
    Standard(Transform),
    Ticker(TickerPath),
}

impl AnimationState {
    pub fn opacity(&self) -> f64 {
        match self {
            AnimationState::Standard(t) => t.opacity,
            AnimationState::Ticker(t) => t.opacity,
        }
    }
}

/// Window quantities shared by the evaluators.
#[derive(Debug, Clone, Copy)]
struct Window {
    /// `(now − start) / total`, clamped to `[0, 1]`.
    progress: f64,
    /// Share of the window occupied by the animation, `(0, 1]`.
    anim_frac: f64,
}

/// Evaluate an overlay at `time`.
///
/// Returns `None` when the overlay is not visible, including degenerate
/// windows (`end ≤ start`), which are rejected here instead of dividing by zero.
pub fn evaluate(overlay: &Overlay, time: FrameTime, rect: &DrawRect) -> Option<AnimationState> {
    let total = overlay.window_secs();
    if !(total > 0.0) || !overlay.is_visible(time.media_secs) {
        return None;
    }

    let progress = ((time.media_secs - overlay.start_secs) / total).clamp(0.0, 1.0);
    let anim_secs = if overlay.animation_duration_secs > 0.0 {
        overlay.animation_duration_secs.min(total)
    } else {
        total
    };
    let window = Window {
        progress,
        anim_frac: anim_secs / total,
    };
    let base = overlay.style.base_opacity();

    let state = match overlay.animation {
        AnimationKind::None => AnimationState::Standard(Transform::identity(base)),
        AnimationKind::FadeIn => AnimationState::Standard(fade_in(base, window)),
        AnimationKind::FadeOut => AnimationState::Standard(fade_out(base, window)),
        AnimationKind::FadeInOut => AnimationState::Standard(fade_in_out(base, window)),
        AnimationKind::SlideLeft => AnimationState::Standard(slide(base, window, rect, 1.0)),
        AnimationKind::SlideRight => AnimationState::Standard(slide(base, window, rect, -1.0)),
        AnimationKind::ZoomIn => AnimationState::Standard(zoom_in(base, window)),
        AnimationKind::Floating => AnimationState::Standard(floating(base, time)),
        AnimationKind::Ticker => AnimationState::Ticker(ticker(base, time, rect)),
    };
    Some(state)
}

fn with_factor(base: f64, factor: f64) -> f64 {
    (base * factor.clamp(0.0, 1.0)).clamp(0.0, base)
}

fn fade_in(base: f64, w: Window) -> Transform {
    Transform::identity(with_factor(base, (w.progress / w.anim_frac).min(1.0)))
}

fn fade_out(base: f64, w: Window) -> Transform {
    Transform::identity(with_factor(base, ((1.0 - w.progress) / w.anim_frac).min(1.0)))
}

fn fade_in_out(base: f64, w: Window) -> Transform {
    let factor = if w.progress < 0.5 {
        (2.0 * w.progress / w.anim_frac).min(1.0)
    } else {
        (2.0 * (1.0 - w.progress) / w.anim_frac).min(1.0)
    };
    Transform::identity(with_factor(base, factor))
}

/// `direction` is `1.0` for slide-left (enters from the right) and `-1.0`
/// for slide-right.
fn slide(base: f64, w: Window, rect: &DrawRect, direction: f64) -> Transform {
    Transform {
        translate_x: direction * (1.0 - w.progress) * rect.width * SLIDE_DISTANCE_FRACTION,
        ..Transform::identity(base)
    }
}

fn zoom_in(base: f64, w: Window) -> Transform {
    Transform {
        scale: ZOOM_START_SCALE + (1.0 - ZOOM_START_SCALE) * (w.progress / w.anim_frac).min(1.0),
        ..Transform::identity(base)
    }
}

fn floating(base: f64, time: FrameTime) -> Transform {
    Transform {
        translate_y: (time.clock_secs * TAU).sin() * FLOAT_AMPLITUDE_PX,
        ..Transform::identity(base)
    }
}

fn ticker(base: f64, time: FrameTime, rect: &DrawRect) -> TickerPath {
    TickerPath {
        opacity: base,
        travel_px: time.clock_secs * TICKER_SPEED_PX_PER_SEC,
        baseline_y: rect.offset_y + rect.height * TICKER_BASELINE_FRACTION,
    }
}
