//! Solid: generator that superimposes a flat colour over the clip.
//!
//! Output resolution is a percentage of the clip's native size. A zero
//! resolution yields no texture, which the pipeline reports as a retry.

use super::{EffectCaps, EffectOps};
use crate::entities::frame::Frame;
use crate::entities::params::{EffectRow, ParamValue, RowAccess};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Solid;

impl EffectOps for Solid {
    fn name(&self) -> &'static str {
        "Solid"
    }

    fn caps(&self) -> EffectCaps {
        EffectCaps {
            superimpose: true,
            ..Default::default()
        }
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        vec![
            EffectRow::single("color", ParamValue::Color([1.0, 1.0, 1.0, 1.0])),
            EffectRow::single("resolution", ParamValue::Vec2([100.0, 100.0])),
        ]
    }

    fn superimpose(&self, rows: &[EffectRow], time: f64, size: (u32, u32)) -> Option<Frame> {
        let color = rows.color_at("color", time, [1.0; 4]);
        let [sx, sy] = rows.vec2_at("resolution", time, [100.0, 100.0]);
        let width = (size.0 as f32 * sx.max(0.0) / 100.0).round() as usize;
        let height = (size.1 as f32 * sy.max(0.0) / 100.0).round() as usize;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Frame::solid(width, height, color))
    }
}
