//! Transition kinds. `time` is the normalized progress through the
//! transition; the edge decides whether the clip fades in or out.

use super::{EffectCaps, EffectOps, TransitionArg};
use crate::entities::params::{EffectRow, ParamValue, RowAccess};
use crate::render::coords::TextureCoords;
use crate::render::shader::ShaderStage;

/// Visibility at `progress` for the given edge
fn ramp(progress: f64, arg: TransitionArg) -> Option<f32> {
    let p = progress.clamp(0.0, 1.0) as f32;
    match arg {
        TransitionArg::Opening => Some(p),
        TransitionArg::Closing => Some(1.0 - p),
        TransitionArg::NoTransition => None,
    }
}

/// Opacity ramp
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrossDissolve;

impl EffectOps for CrossDissolve {
    fn name(&self) -> &'static str {
        "Cross Dissolve"
    }

    fn caps(&self) -> EffectCaps {
        EffectCaps {
            coords: true,
            ..Default::default()
        }
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        Vec::new()
    }

    fn process_coords(&self, _rows: &[EffectRow], time: f64, coords: &mut TextureCoords, arg: TransitionArg) {
        if let Some(visible) = ramp(time, arg) {
            coords.opacity *= visible;
        }
    }
}

/// Left-to-right reveal (opening) or hide (closing)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinearWipe;

impl EffectOps for LinearWipe {
    fn name(&self) -> &'static str {
        "Linear Wipe"
    }

    fn caps(&self) -> EffectCaps {
        EffectCaps {
            shader: true,
            ..Default::default()
        }
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        // Edge softness as a fraction of the frame width
        vec![EffectRow::single("feather", ParamValue::Float(0.0))]
    }

    fn shader_stage(&self, rows: &[EffectRow], time: f64, arg: TransitionArg) -> Option<ShaderStage> {
        ramp(time, arg)?;
        Some(ShaderStage::Wipe {
            progress: time.clamp(0.0, 1.0) as f32,
            feather: rows.float_at("feather", time, 0.0).max(0.0),
            closing: arg == TransitionArg::Closing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dissolve fades in on the opening edge and out on the closing edge
    #[test]
    fn test_cross_dissolve() {
        let mut coords = TextureCoords::for_clip(10.0, 10.0);
        CrossDissolve.process_coords(&[], 0.25, &mut coords, TransitionArg::Opening);
        assert!((coords.opacity - 0.25).abs() < 1e-6);

        let mut coords = TextureCoords::for_clip(10.0, 10.0);
        CrossDissolve.process_coords(&[], 0.25, &mut coords, TransitionArg::Closing);
        assert!((coords.opacity - 0.75).abs() < 1e-6);

        let mut coords = TextureCoords::for_clip(10.0, 10.0);
        CrossDissolve.process_coords(&[], 0.25, &mut coords, TransitionArg::NoTransition);
        assert_eq!(coords.opacity, 1.0);
    }

    /// Wipe only produces a stage when bound to an edge
    #[test]
    fn test_wipe_stage() {
        let rows = LinearWipe.default_rows();
        assert!(LinearWipe.shader_stage(&rows, 0.5, TransitionArg::NoTransition).is_none());
        assert_eq!(
            LinearWipe.shader_stage(&rows, 0.5, TransitionArg::Closing),
            Some(ShaderStage::Wipe { progress: 0.5, feather: 0.0, closing: true })
        );
    }
}
