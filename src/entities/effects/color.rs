//! Color correction stages: brightness/contrast and HSV adjust.
//!
//! Both are pure shader effects. Passes that would not change the image are
//! skipped so they cost no ping-pong write.

use super::{EffectCaps, EffectOps, TransitionArg};
use crate::entities::params::{EffectRow, ParamValue, RowAccess};
use crate::render::shader::ShaderStage;

const SHADER_ONLY: EffectCaps = EffectCaps {
    coords: false,
    shader: true,
    superimpose: false,
    gizmos: false,
};

/// `(v - 0.5) * (1 + contrast) + 0.5 + brightness`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrightnessContrast;

impl EffectOps for BrightnessContrast {
    fn name(&self) -> &'static str {
        "Brightness/Contrast"
    }

    fn caps(&self) -> EffectCaps {
        SHADER_ONLY
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        vec![
            // -1.0 (black) to 1.0 (white)
            EffectRow::single("brightness", ParamValue::Float(0.0)),
            // -1.0 (flat gray) to 1.0 (high contrast)
            EffectRow::single("contrast", ParamValue::Float(0.0)),
        ]
    }

    fn shader_stage(&self, rows: &[EffectRow], time: f64, _arg: TransitionArg) -> Option<ShaderStage> {
        let brightness = rows.float_at("brightness", time, 0.0).clamp(-1.0, 1.0);
        let contrast = rows.float_at("contrast", time, 0.0).clamp(-1.0, 1.0);
        if brightness.abs() < 0.0001 && contrast.abs() < 0.0001 {
            return None;
        }
        Some(ShaderStage::BrightnessContrast { brightness, contrast })
    }
}

/// Hue rotation plus saturation and value multipliers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdjustHsv;

impl EffectOps for AdjustHsv {
    fn name(&self) -> &'static str {
        "Adjust HSV"
    }

    fn caps(&self) -> EffectCaps {
        SHADER_ONLY
    }

    fn default_rows(&self) -> Vec<EffectRow> {
        vec![
            EffectRow::single("hue_shift", ParamValue::Float(0.0)),
            EffectRow::single("saturation", ParamValue::Float(1.0)),
            EffectRow::single("value", ParamValue::Float(1.0)),
        ]
    }

    fn shader_stage(&self, rows: &[EffectRow], time: f64, _arg: TransitionArg) -> Option<ShaderStage> {
        let hue = rows.float_at("hue_shift", time, 0.0).clamp(-180.0, 180.0);
        let saturation = rows.float_at("saturation", time, 1.0).clamp(0.0, 2.0);
        let value = rows.float_at("value", time, 1.0).clamp(0.0, 2.0);
        if hue.abs() < 0.01 && (saturation - 1.0).abs() < 0.0001 && (value - 1.0).abs() < 0.0001 {
            return None;
        }
        Some(ShaderStage::AdjustHsv { hue, saturation, value })
    }
}
