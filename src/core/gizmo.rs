//! Gizmo selection: which effect's handles the viewer shows.
//!
//! Only the viewed (outermost) sequence takes part. An explicitly selected
//! gizmo effect wins; failing that, a selected clip offers its first gizmo
//! effect. Otherwise the previous choice sticks.

use glam::{Mat4, Vec4};
use uuid::Uuid;

use crate::entities::clip::ClipId;
use crate::entities::effects::{Effect, EffectOps};
use crate::render::coords::TextureCoords;

/// Authoritative gizmo effect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GizmoRef {
    pub clip: ClipId,
    pub effect: Uuid,
}

/// Gizmo effects seen while drawing one clip
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GizmoCandidates {
    pub first: Option<Uuid>,
    pub selected: Option<Uuid>,
}

impl GizmoCandidates {
    pub fn offer(&mut self, effect: &Effect) {
        if !effect.has_gizmos() {
            return;
        }
        self.first.get_or_insert(effect.uuid);
        if effect.selected {
            self.selected = Some(effect.uuid);
        }
    }

    pub fn contains(&self, effect: Uuid) -> bool {
        self.first == Some(effect) || self.selected == Some(effect)
    }
}

#[derive(Debug, Default)]
pub struct GizmoSelector {
    current: Option<GizmoRef>,
}

impl GizmoSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<GizmoRef> {
        self.current
    }

    /// Update from one clip's candidates. Returns true if the choice changed.
    pub fn select(&mut self, clip: ClipId, clip_selected: bool, seen: GizmoCandidates) -> bool {
        let next = if let Some(effect) = seen.selected {
            Some(GizmoRef { clip, effect })
        } else if clip_selected {
            seen.first.map(|effect| GizmoRef { clip, effect })
        } else {
            return false;
        };
        let changed = next != self.current;
        self.current = next;
        changed
    }

    /// True if the current choice is one of `seen` on `clip`
    pub fn is_current(&self, clip: ClipId, seen: &GizmoCandidates) -> bool {
        self.current.is_some_and(|g| g.clip == clip && seen.contains(g.effect))
    }

    /// Lay out `effect`'s handles for the final frame and convert them to
    /// viewport pixels (origin top-left).
    pub fn layout(effect: &mut Effect, time: f64, coords: &TextureCoords, mvp: Mat4, viewport: (u32, u32)) {
        let mut gizmos = effect.kind.gizmo_layout(&effect.rows, time, coords);
        for gizmo in gizmos.iter_mut() {
            let clip = mvp * Vec4::new(gizmo.world.x, gizmo.world.y, 0.0, 1.0);
            let w = if clip.w.abs() > f32::EPSILON { clip.w } else { 1.0 };
            gizmo.screen.x = (clip.x / w * 0.5 + 0.5) * viewport.0 as f32;
            gizmo.screen.y = (clip.y / w * 0.5 + 0.5) * viewport.1 as f32;
        }
        effect.gizmos = gizmos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::effects::{BrightnessContrast, CornerPin, Transform};
    use crate::entities::params::ParamValue;
    use glam::Vec2;

    fn candidates(effects: &[Effect]) -> GizmoCandidates {
        let mut seen = GizmoCandidates::default();
        for e in effects {
            seen.offer(e);
        }
        seen
    }

    /// Selected gizmo effects win over the first one
    #[test]
    fn test_selected_effect_wins() {
        let effects = vec![
            Effect::new(BrightnessContrast),
            Effect::new(Transform),
            Effect::new(CornerPin).selected(true),
        ];
        let seen = candidates(&effects);
        assert_eq!(seen.first, Some(effects[1].uuid));

        let clip = ClipId::new();
        let mut selector = GizmoSelector::new();
        assert!(selector.select(clip, false, seen));
        assert_eq!(selector.current().map(|g| g.effect), Some(effects[2].uuid));
        assert!(!selector.select(clip, false, seen));
    }

    /// A selected clip falls back to its first gizmo effect
    #[test]
    fn test_clip_selection_fallback() {
        let effects = vec![Effect::new(Transform), Effect::new(CornerPin)];
        let clip = ClipId::new();
        let mut selector = GizmoSelector::new();
        selector.select(clip, true, candidates(&effects));
        assert_eq!(selector.current(), Some(GizmoRef { clip, effect: effects[0].uuid }));
        assert!(selector.is_current(clip, &candidates(&effects)));
    }

    /// Nothing selected leaves the previous choice in place
    #[test]
    fn test_sticky() {
        let effects = vec![Effect::new(Transform)];
        let a = ClipId::new();
        let mut selector = GizmoSelector::new();
        selector.select(a, true, candidates(&effects));
        let before = selector.current();

        let other = vec![Effect::new(Transform)];
        assert!(!selector.select(ClipId::new(), false, candidates(&other)));
        assert_eq!(selector.current(), before);
    }

    /// A selected clip without gizmo effects clears the choice
    #[test]
    fn test_selected_clip_without_gizmos() {
        let a = ClipId::new();
        let mut selector = GizmoSelector::new();
        selector.select(a, true, candidates(&[Effect::new(Transform)]));
        assert!(selector.select(ClipId::new(), true, candidates(&[Effect::new(BrightnessContrast)])));
        assert!(selector.current().is_none());
    }

    /// World points map through the projection into viewport pixels
    #[test]
    fn test_world_to_screen() {
        let mut effect = Effect::new(Transform).with("position", ParamValue::Vec2([50.0, -25.0]));
        let projection = Mat4::orthographic_rh_gl(-100.0, 100.0, -50.0, 50.0, -1.0, 10.0);
        GizmoSelector::layout(&mut effect, 0.0, &TextureCoords::for_clip(10.0, 10.0), projection, (200, 100));
        assert_eq!(effect.gizmos.len(), 1);
        let screen = effect.gizmos[0].screen;
        assert!((screen - Vec2::new(150.0, 25.0)).length() < 1e-3);
    }
}
