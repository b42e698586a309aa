//! Transform effect: position, uniform scale, rotation, opacity and blend mode.
//!
//! Scale and rotation pivot on the frame origin (clip center), then the
//! position offset is added. Opacity multiplies into the compositing frame,
//! so stacked transforms compound.

use glam::{Vec2, Vec3};

use super::{EffectCaps, EffectOps, Gizmo, GizmoKind, TransitionArg};
use crate::entities::params::{EffectRow, ParamValue, RowAccess};
use crate::render::blend::BlendMode;
use crate::render::coords::TextureCoords;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Transform;

impl EffectOps for Transform {
    fn name(&self) -> &'static str {
        "Transform"
    }

    fn caps(&self) -> EffectCaps {
        EffectCaps {
            coords: true,
            gizmos: true,
            ..Default::default()
        }
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        vec![
            EffectRow::single("position", ParamValue::Vec2([0.0, 0.0])),
            EffectRow::single("scale", ParamValue::Float(100.0)),
            EffectRow::single("rotation", ParamValue::Float(0.0)),
            EffectRow::single("opacity", ParamValue::Float(100.0)),
            EffectRow::single("blend_mode", ParamValue::Choice(BlendMode::Normal.index())),
        ]
    }

    fn process_coords(&self, rows: &[EffectRow], time: f64, coords: &mut TextureCoords, _arg: TransitionArg) {
        let [px, py] = rows.vec2_at("position", time, [0.0, 0.0]);
        let scale = rows.float_at("scale", time, 100.0) / 100.0;
        let (sin, cos) = rows.float_at("rotation", time, 0.0).to_radians().sin_cos();

        coords.map_vertices(|v| {
            let x = v.x * scale;
            let y = v.y * scale;
            Vec3::new(x * cos - y * sin + px, x * sin + y * cos + py, v.z)
        });

        let opacity = rows.float_at("opacity", time, 100.0) / 100.0;
        coords.opacity *= opacity.clamp(0.0, 1.0);
        coords.blend_mode = BlendMode::from_index(rows.choice_at("blend_mode", time, 0));
    }

    fn gizmo_layout(&self, rows: &[EffectRow], time: f64, _coords: &TextureCoords) -> Vec<Gizmo> {
        let position = Vec2::from(rows.vec2_at("position", time, [0.0, 0.0]));
        vec![Gizmo::new(GizmoKind::Move, "position", position)]
    }
}
