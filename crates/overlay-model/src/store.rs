//! The ordered overlay collection of one editing session.

use reeltext_common::config::EditorDefaults;

use crate::command::EditCommand;
use crate::error::OverlayError;
use crate::overlay::{AnimationKind, Overlay, OverlayId, OverlayPatch, Position};
use crate::style::TextStyle;

/// Shortest window a new overlay may get when squeezed against the end of the video.
const MIN_WINDOW_SECS: f64 = 1e-3;

/// Overlays in paint order plus a single selection pointer.
///
/// Lives exactly as long as one loaded video; create a fresh store when a new
/// video is selected.
#[derive(Debug, Clone)]
pub struct OverlayStore {
    overlays: Vec<Overlay>,
    selected: Option<OverlayId>,
    next_id: u64,
    defaults: EditorDefaults,
    duration_secs: Option<f64>,
}

impl OverlayStore {
    pub fn new(defaults: EditorDefaults) -> Self {
        Self {
            overlays: Vec::new(),
            selected: None,
            next_id: 1,
            defaults,
            duration_secs: None,
        }
    }

    /// Bound overlay windows by the source video duration.
    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.set_duration(duration_secs);
        self
    }

    pub fn set_duration(&mut self, duration_secs: f64) {
        self.duration_secs = (duration_secs.is_finite() && duration_secs > 0.0)
            .then_some(duration_secs);
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Create an overlay starting at `now` with the default window and select it.
    pub fn add_at(&mut self, now: f64) -> Result<OverlayId, OverlayError> {
        let (start_secs, end_secs) = self.default_window(now);
        let window = end_secs - start_secs;
        let overlay = Overlay {
            id: OverlayId(0),
            text: self.defaults.text.clone(),
            start_secs,
            end_secs,
            style: TextStyle {
                font_family: self.defaults.font_family.clone(),
                font_size: self.defaults.font_size,
                ..TextStyle::default()
            },
            position: Position::CENTER,
            animation: AnimationKind::None,
            animation_duration_secs: self.defaults.animation_duration_secs.min(window),
        };
        let id = self.insert(overlay)?;
        self.selected = Some(id);
        Ok(id)
    }

    /// Insert a fully specified overlay. A fresh id is assigned.
    pub fn insert(&mut self, mut overlay: Overlay) -> Result<OverlayId, OverlayError> {
        overlay.normalize()?;
        overlay.validate(self.duration_secs)?;
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        overlay.id = id;
        tracing::debug!(overlay_id = %id, start = overlay.start_secs, end = overlay.end_secs, "Overlay added");
        self.overlays.push(overlay);
        Ok(id)
    }

    /// Apply a partial patch. Invalid results leave the overlay unchanged.
    pub fn update(&mut self, id: OverlayId, patch: &OverlayPatch) -> Result<(), OverlayError> {
        let duration = self.duration_secs;
        let slot = self.get_mut(id)?;
        let mut candidate = slot.clone();
        patch.apply_to(&mut candidate);
        candidate.normalize()?;
        candidate.validate(duration)?;
        *slot = candidate;
        Ok(())
    }

    /// Move an overlay. Used by drag write-back; the position is clamped.
    pub fn set_position(&mut self, id: OverlayId, position: Position) -> Result<(), OverlayError> {
        let slot = self.get_mut(id)?;
        slot.position = Position::clamped(position.x, position.y);
        Ok(())
    }

    /// Remove an overlay, clearing the selection if it pointed at it.
    pub fn remove(&mut self, id: OverlayId) -> Result<Overlay, OverlayError> {
        let index = self
            .overlays
            .iter()
            .position(|o| o.id == id)
            .ok_or(OverlayError::NotFound { id })?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        tracing::debug!(overlay_id = %id, "Overlay removed");
        Ok(self.overlays.remove(index))
    }

    pub fn select(&mut self, id: Option<OverlayId>) -> Result<(), OverlayError> {
        if let Some(id) = id {
            self.get(id).ok_or(OverlayError::NotFound { id })?;
        }
        self.selected = id;
        Ok(())
    }

    pub fn selected_id(&self) -> Option<OverlayId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Overlay> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: OverlayId) -> Result<&mut Overlay, OverlayError> {
        self.overlays
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(OverlayError::NotFound { id })
    }

    /// All overlays in paint order.
    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter()
    }

    pub fn as_slice(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Execute an edit command. Returns the id of a newly added overlay.
    pub fn apply(&mut self, command: &EditCommand) -> Result<Option<OverlayId>, OverlayError> {
        match command {
            EditCommand::Add { at_secs, patch } => {
                let id = self.add_at(*at_secs)?;
                if !patch.is_empty() {
                    if let Err(e) = self.update(id, patch) {
                        self.remove(id)?;
                        return Err(e);
                    }
                }
                Ok(Some(id))
            }
            EditCommand::Update { id, patch } => self.update(*id, patch).map(|_| None),
            EditCommand::Remove { id } => self.remove(*id).map(|_| None),
            EditCommand::Select { id } => self.select(*id).map(|_| None),
        }
    }

    fn default_window(&self, now: f64) -> (f64, f64) {
        let length = self.defaults.overlay_duration_secs;
        let mut start = if now.is_finite() { now.max(0.0) } else { 0.0 };
        let mut end = start + length;
        if let Some(duration) = self.duration_secs {
            start = start.min(duration);
            end = end.min(duration);
            if end - start < MIN_WINDOW_SECS {
                start = (duration - length).max(0.0);
                end = duration;
            }
        }
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> OverlayStore {
        OverlayStore::new(EditorDefaults::default()).with_duration(10.0)
    }

    #[test]
    fn test_add_uses_current_time_and_selects() {
        let mut s = store();
        let id = s.add_at(2.5).unwrap();
        let o = s.get(id).unwrap();
        assert_eq!(o.start_secs, 2.5);
        assert_eq!(o.end_secs, 5.5);
        assert_eq!(o.animation_duration_secs, 1.0);
        assert_eq!(s.selected_id(), Some(id));
    }

    #[test]
    fn test_add_near_end_is_truncated() {
        let mut s = store();
        let id = s.add_at(9.0).unwrap();
        let o = s.get(id).unwrap();
        assert_eq!((o.start_secs, o.end_secs), (9.0, 10.0));
    }

    #[test]
    fn test_add_at_end_shifts_window_back() {
        let mut s = store();
        let id = s.add_at(10.0).unwrap();
        let o = s.get(id).unwrap();
        assert_eq!((o.start_secs, o.end_secs), (7.0, 10.0));
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut s = store();
        assert_eq!(s.add_at(0.0).unwrap(), OverlayId(1));
        assert_eq!(s.add_at(0.0).unwrap(), OverlayId(2));
        s.remove(OverlayId(2)).unwrap();
        assert_eq!(s.add_at(0.0).unwrap(), OverlayId(3));
    }

    #[test]
    fn test_invalid_update_keeps_previous_state() {
        let mut s = store();
        let id = s.add_at(1.0).unwrap();
        let patch = OverlayPatch {
            end_secs: Some(0.5),
            text: Some("changed".to_string()),
            ..OverlayPatch::default()
        };
        assert!(s.update(id, &patch).is_err());
        let o = s.get(id).unwrap();
        assert_eq!(o.text, "Your text");
        assert_eq!(o.end_secs, 4.0);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let mut s = store();
        let err = s
            .update(OverlayId(42), &OverlayPatch::default())
            .unwrap_err();
        assert!(matches!(err, OverlayError::NotFound { .. }));
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut s = store();
        let id = s.add_at(0.0).unwrap();
        s.remove(id).unwrap();
        assert!(s.selected().is_none());
        assert!(s.is_empty());
    }

    #[test]
    fn test_select_unknown_fails() {
        let mut s = store();
        assert!(s.select(Some(OverlayId(9))).is_err());
        s.select(None).unwrap();
    }

    #[test]
    fn test_paint_order_is_insertion_order() {
        let mut s = store();
        let a = s.add_at(5.0).unwrap();
        let b = s.add_at(0.0).unwrap();
        let c = s.add_at(1.0).unwrap();
        let ids: Vec<_> = s.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_apply_add_with_invalid_patch_rolls_back() {
        let mut s = store();
        let cmd = EditCommand::Add {
            at_secs: 1.0,
            patch: OverlayPatch {
                animation_duration_secs: Some(0.0),
                ..OverlayPatch::default()
            },
        };
        assert!(s.apply(&cmd).is_err());
        assert!(s.is_empty());
    }

    #[test]
    fn test_set_position_clamps() {
        let mut s = store();
        let id = s.add_at(0.0).unwrap();
        s.set_position(id, Position::new(-5.0, 130.0)).unwrap();
        assert_eq!(s.get(id).unwrap().position, Position::new(0.0, 100.0));
    }
}
