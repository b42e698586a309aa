//! Corner pin: offsets each corner independently and asks for a mesh grid so
//! the warp bends smoothly instead of folding along the quad diagonal.

use glam::Vec2;

use super::{EffectCaps, EffectOps, Gizmo, GizmoKind, TransitionArg};
use crate::entities::params::{EffectRow, ParamValue, RowAccess};
use crate::render::coords::{BL, BR, TL, TR, TextureCoords};

/// Corner fields in vertex order
const CORNERS: [(&str, usize); 4] = [
    ("top_left", TL),
    ("top_right", TR),
    ("bottom_right", BR),
    ("bottom_left", BL),
];

const DEFAULT_SUBDIVISIONS: f32 = 8.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CornerPin;

impl EffectOps for CornerPin {
    fn name(&self) -> &'static str {
        "Corner Pin"
    }

    fn caps(&self) -> EffectCaps {
        EffectCaps {
            coords: true,
            gizmos: true,
            ..Default::default()
        }
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        let mut rows: Vec<EffectRow> = CORNERS
            .iter()
            .map(|(name, _)| EffectRow::single(name, ParamValue::Vec2([0.0, 0.0])))
            .collect();
        rows.push(EffectRow::single("subdivisions", ParamValue::Float(DEFAULT_SUBDIVISIONS)));
        rows
    }

    fn process_coords(&self, rows: &[EffectRow], time: f64, coords: &mut TextureCoords, _arg: TransitionArg) {
        for (name, corner) in CORNERS {
            let [dx, dy] = rows.vec2_at(name, time, [0.0, 0.0]);
            coords.vertices[corner].x += dx;
            coords.vertices[corner].y += dy;
        }
        let subdivisions = rows.float_at("subdivisions", time, DEFAULT_SUBDIVISIONS).round().max(1.0);
        coords.grid_size = coords.grid_size.max(subdivisions as u32);
    }

    fn gizmo_layout(&self, _rows: &[EffectRow], _time: f64, coords: &TextureCoords) -> Vec<Gizmo> {
        CORNERS
            .iter()
            .map(|(name, corner)| {
                let v = coords.vertices[*corner];
                Gizmo::new(GizmoKind::Dot, name, Vec2::new(v.x, v.y))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    /// Offsets move only their own corner and enable the grid
    #[test]
    fn test_pin_corner() {
        let mut rows = CornerPin.default_rows();
        if let Some(f) = rows.field_mut("bottom_right") {
            f.value = ParamValue::Vec2([20.0, 0.0]);
        }
        let mut coords = TextureCoords::for_clip(100.0, 100.0);
        CornerPin.process_coords(&rows, 0.0, &mut coords, TransitionArg::NoTransition);

        assert_eq!(coords.vertices[BR], Vec3::new(70.0, 50.0, 1.0));
        assert_eq!(coords.vertices[TL], Vec3::new(-50.0, -50.0, 1.0));
        assert_eq!(coords.grid_size, 8);

        let gizmos = CornerPin.gizmo_layout(&rows, 0.0, &coords);
        assert_eq!(gizmos.len(), 4);
        assert_eq!(gizmos[2].world, Vec2::new(70.0, 50.0));
        assert!(gizmos.iter().all(|g| g.kind == GizmoKind::Dot));
    }
}
