//! Pointer dragging of the selected overlay.
//!
//! Pointer coordinates are converted to percentages of the drawing
//! surface's on-screen bounds (not the draw rectangle). The grab offset
//! recorded on pointer-down keeps the overlay from jumping under the pointer.

use reeltext_common::ReeltextError;
use reeltext_overlay_model::overlay::{clamp_percent, OverlayId, Position};
use reeltext_overlay_model::store::OverlayStore;

/// On-screen rectangle of the drawing surface, in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }

    /// Pointer position as clamped percentages of the bounds.
    pub fn to_percent(&self, x: f64, y: f64) -> Option<Position> {
        if self.is_empty() {
            return None;
        }
        Some(Position::clamped(
            (x - self.left) / self.width * 100.0,
            (y - self.top) / self.height * 100.0,
        ))
    }
}

/// An in-progress drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub overlay_id: OverlayId,
    /// Pointer percentage minus overlay position at grab time.
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Default)]
pub struct DragController {
    active: Option<DragState>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&DragState> {
        self.active.as_ref()
    }

    /// Begin dragging the selected overlay. Returns whether a drag started.
    pub fn pointer_down(
        &mut self,
        store: &OverlayStore,
        bounds: &SurfaceBounds,
        x: f64,
        y: f64,
    ) -> bool {
        let Some(overlay) = store.selected() else {
            return false;
        };
        if !overlay.animation.is_draggable() {
            tracing::debug!(overlay_id = %overlay.id, "Floating overlay cannot be dragged");
            return false;
        }
        let Some(pointer) = bounds.to_percent(x, y) else {
            return false;
        };

        self.active = Some(DragState {
            overlay_id: overlay.id,
            offset_x: pointer.x - overlay.position.x,
            offset_y: pointer.y - overlay.position.y,
        });
        true
    }

    /// Move the dragged overlay. Returns the stored position, or `None` when
    /// no drag is active or the overlay has gone away.
    pub fn pointer_move(
        &mut self,
        store: &mut OverlayStore,
        bounds: &SurfaceBounds,
        x: f64,
        y: f64,
    ) -> Option<Position> {
        let drag = self.active?;
        let pointer = bounds.to_percent(x, y)?;
        let position = Position::new(
            clamp_percent(pointer.x - drag.offset_x),
            clamp_percent(pointer.y - drag.offset_y),
        );

        match store.set_position(drag.overlay_id, position) {
            Ok(()) => Some(position),
            Err(e) => {
                let e = ReeltextError::from(e);
                tracing::debug!(overlay_id = %drag.overlay_id, error = %e, "Dragged overlay vanished; ending drag");
                self.active = None;
                None
            }
        }
    }

    /// End the drag, returning the overlay that was being dragged.
    pub fn pointer_up(&mut self) -> Option<OverlayId> {
        self.active.take().map(|d| d.overlay_id)
    }

    /// Forget any drag without a pointer-up (e.g. the store was replaced).
    pub fn reset(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reeltext_common::config::EditorDefaults;
    use reeltext_overlay_model::overlay::{AnimationKind, OverlayPatch};

    fn store_with(kind: AnimationKind) -> (OverlayStore, OverlayId) {
        let mut store = OverlayStore::new(EditorDefaults::default()).with_duration(10.0);
        let id = store.add_at(0.0).unwrap();
        store
            .update(
                id,
                &OverlayPatch {
                    animation: Some(kind),
                    ..OverlayPatch::default()
                },
            )
            .unwrap();
        (store, id)
    }

    fn bounds() -> SurfaceBounds {
        SurfaceBounds::new(100.0, 50.0, 400.0, 200.0)
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let (mut store, id) = store_with(AnimationKind::None);
        let mut drag = DragController::new();
        // Grab 10% right of the overlay center.
        assert!(drag.pointer_down(&store, &bounds(), 340.0, 150.0));
        let pos = drag.pointer_move(&mut store, &bounds(), 380.0, 170.0).unwrap();
        assert!((pos.x - 60.0).abs() < 1e-9);
        assert!((pos.y - 60.0).abs() < 1e-9);
        assert_eq!(store.get(id).unwrap().position, pos);
        assert_eq!(drag.pointer_up(), Some(id));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn test_floating_overlay_is_not_draggable() {
        let (store, _) = store_with(AnimationKind::Floating);
        let mut drag = DragController::new();
        assert!(!drag.pointer_down(&store, &bounds(), 300.0, 150.0));
    }

    #[test]
    fn test_no_selection_no_drag() {
        let (mut store, _) = store_with(AnimationKind::None);
        store.select(None).unwrap();
        let mut drag = DragController::new();
        assert!(!drag.pointer_down(&store, &bounds(), 300.0, 150.0));
        assert!(drag.pointer_move(&mut store, &bounds(), 0.0, 0.0).is_none());
    }

    #[test]
    fn test_empty_bounds_refuse_drag() {
        let (store, _) = store_with(AnimationKind::None);
        let mut drag = DragController::new();
        let empty = SurfaceBounds::new(0.0, 0.0, 0.0, 100.0);
        assert!(!drag.pointer_down(&store, &empty, 1.0, 1.0));
    }

    #[test]
    fn test_removed_overlay_ends_drag() {
        let (mut store, id) = store_with(AnimationKind::None);
        let mut drag = DragController::new();
        assert!(drag.pointer_down(&store, &bounds(), 300.0, 150.0));
        store.remove(id).unwrap();
        assert!(drag.pointer_move(&mut store, &bounds(), 320.0, 150.0).is_none());
        assert!(!drag.is_dragging());
    }

    #[test]
    fn test_offset_past_edge_is_clamped() {
        let (mut store, id) = store_with(AnimationKind::None);
        let mut drag = DragController::new();
        // Grab at the far right edge: offset +50%.
        assert!(drag.pointer_down(&store, &bounds(), 500.0, 150.0));
        let pos = drag.pointer_move(&mut store, &bounds(), 100.0, 150.0).unwrap();
        assert_eq!(pos.x, 0.0);
        assert_eq!(store.get(id).unwrap().position.x, 0.0);
    }

    proptest! {
        #[test]
        fn prop_drag_never_leaves_range(
            down in (-200.0f64..800.0, -200.0f64..500.0),
            moves in prop::collection::vec((-1000.0f64..1500.0, -1000.0f64..1500.0), 1..20),
        ) {
            let (mut store, id) = store_with(AnimationKind::SlideLeft);
            let mut drag = DragController::new();
            drag.pointer_down(&store, &bounds(), down.0, down.1);
            for (x, y) in moves {
                drag.pointer_move(&mut store, &bounds(), x, y);
                let p = store.get(id).unwrap().position;
                prop_assert!((0.0..=100.0).contains(&p.x));
                prop_assert!((0.0..=100.0).contains(&p.y));
            }
        }
    }
}
