//! Layout geometry: fitting the video picture into a drawing surface.
//!
//! Coordinates here are layout pixels of the drawing surface. Overlay
//! positions are percentages of the [`DrawRect`], never of the full surface.

use serde::{Deserialize, Serialize};

use crate::overlay::Position;

/// A width/height pair in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Sizes with a non-positive or non-finite side hold nothing.
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

/// The region of the drawing surface where the video picture is painted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawRect {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl DrawRect {
    pub const EMPTY: DrawRect = DrawRect {
        offset_x: 0.0,
        offset_y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(offset_x: f64, offset_y: f64, width: f64, height: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            width,
            height,
        }
    }

    /// The largest rectangle with the video's aspect ratio that fits inside
    /// the container, centered. Never crops.
    ///
    /// Returns [`DrawRect::EMPTY`] when either size is empty.
    pub fn contain(container: Size, video: Size) -> DrawRect {
        if container.is_empty() || video.is_empty() {
            return DrawRect::EMPTY;
        }

        if video.aspect_ratio() > container.aspect_ratio() {
            let height = container.width * video.height / video.width;
            DrawRect {
                offset_x: 0.0,
                offset_y: (container.height - height) / 2.0,
                width: container.width,
                height,
            }
        } else {
            let width = container.height * video.width / video.height;
            DrawRect {
                offset_x: (container.width - width) / 2.0,
                offset_y: 0.0,
                width,
                height: container.height,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.offset_x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.offset_y + self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.offset_x && x <= self.right() && y >= self.offset_y && y <= self.bottom()
    }

    /// Absolute point for a percentage position.
    pub fn point_at(&self, position: Position) -> (f64, f64) {
        (
            self.offset_x + position.x / 100.0 * self.width,
            self.offset_y + position.y / 100.0 * self.height,
        )
    }

    /// Percentage position of an absolute point (unclamped).
    pub fn position_of(&self, x: f64, y: f64) -> Option<Position> {
        if self.is_empty() {
            return None;
        }
        Some(Position::new(
            (x - self.offset_x) / self.width * 100.0,
            (y - self.offset_y) / self.height * 100.0,
        ))
    }

    /// Intersection of two rectangles, empty when they do not overlap.
    pub fn intersect(&self, other: &DrawRect) -> DrawRect {
        let left = self.offset_x.max(other.offset_x);
        let top = self.offset_y.max(other.offset_y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return DrawRect::EMPTY;
        }
        DrawRect::new(left, top, right - left, bottom - top)
    }
}

/// Layout size of a drawing surface plus its backing-store density.
///
/// One drawing unit always equals one layout pixel; surfaces scale by
/// `pixel_ratio` internally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMetrics {
    pub layout: Size,
    pub pixel_ratio: f64,
}

impl SurfaceMetrics {
    pub fn new(layout: Size, pixel_ratio: f64) -> Self {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        Self {
            layout,
            pixel_ratio,
        }
    }

    /// Backing-store dimensions in device pixels.
    pub fn backing_size(&self) -> (u32, u32) {
        if self.layout.is_empty() {
            return (0, 0);
        }
        (
            (self.layout.width * self.pixel_ratio).round() as u32,
            (self.layout.height * self.pixel_ratio).round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_contain_width_constrained() {
        let rect = DrawRect::contain(Size::new(400.0, 400.0), Size::new(1920.0, 1080.0));
        assert_eq!(rect.width, 400.0);
        assert_eq!(rect.height, 225.0);
        assert_eq!(rect.offset_x, 0.0);
        assert_eq!(rect.offset_y, 87.5);
    }

    #[test]
    fn test_contain_height_constrained() {
        let rect = DrawRect::contain(Size::new(1600.0, 900.0), Size::new(1080.0, 1920.0));
        assert!((rect.height - 900.0).abs() < 1e-9);
        assert!((rect.width - 506.25).abs() < 1e-9);
        assert_eq!(rect.offset_y, 0.0);
        assert!((rect.offset_x - 546.875).abs() < 1e-9);
    }

    #[test]
    fn test_contain_empty_inputs() {
        assert!(DrawRect::contain(Size::new(0.0, 400.0), Size::new(16.0, 9.0)).is_empty());
        assert!(DrawRect::contain(Size::new(400.0, 400.0), Size::new(16.0, 0.0)).is_empty());
        assert!(DrawRect::contain(Size::new(f64::NAN, 1.0), Size::new(16.0, 9.0)).is_empty());
    }

    #[test]
    fn test_point_round_trip() {
        let rect = DrawRect::new(10.0, 20.0, 200.0, 100.0);
        let (x, y) = rect.point_at(Position::new(25.0, 50.0));
        assert_eq!((x, y), (60.0, 70.0));
        let back = rect.position_of(x, y).unwrap();
        assert!((back.x - 25.0).abs() < 1e-9);
        assert!((back.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersect() {
        let a = DrawRect::new(0.0, 0.0, 100.0, 100.0);
        let b = DrawRect::new(50.0, 60.0, 100.0, 100.0);
        assert_eq!(a.intersect(&b), DrawRect::new(50.0, 60.0, 50.0, 40.0));
        let c = DrawRect::new(200.0, 0.0, 10.0, 10.0);
        assert!(a.intersect(&c).is_empty());
    }

    #[test]
    fn test_backing_size_scales_with_ratio() {
        let metrics = SurfaceMetrics::new(Size::new(640.0, 360.0), 2.0);
        assert_eq!(metrics.backing_size(), (1280, 720));
        let fallback = SurfaceMetrics::new(Size::new(10.0, 10.0), 0.0);
        assert_eq!(fallback.pixel_ratio, 1.0);
    }

    proptest! {
        #[test]
        fn prop_contain_fits_and_keeps_aspect(
            w in 1.0f64..4000.0,
            h in 1.0f64..4000.0,
            vw in 1.0f64..8000.0,
            vh in 1.0f64..8000.0,
        ) {
            let rect = DrawRect::contain(Size::new(w, h), Size::new(vw, vh));
            let eps = 1e-9 * w.max(h);
            prop_assert!(rect.width <= w + eps);
            prop_assert!(rect.height <= h + eps);
            prop_assert!(rect.offset_x >= -eps && rect.offset_y >= -eps);
            let ratio = rect.width / rect.height;
            prop_assert!((ratio - vw / vh).abs() <= 1e-9 * (vw / vh).max(1.0));
            // One side always touches the container.
            prop_assert!((rect.width - w).abs() <= eps || (rect.height - h).abs() <= eps);
        }
    }
}
