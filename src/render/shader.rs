//! Effect shader stages.
//!
//! A `ShaderStage` is the parameterized fragment program an effect asks for
//! when it draws a clip into one of its render targets. The software backend
//! evaluates [`ShaderStage::shade`] per fragment; the GL backend runs the
//! equivalent GLSL with the same uniforms.
//!
//! Colors passed to `shade` are straight RGBA; uv is the 0..1 texture position.

use glam::Vec2;

/// Parameterized per-fragment program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShaderStage {
    /// `(v - 0.5) * (1 + contrast) + 0.5 + brightness`
    BrightnessContrast { brightness: f32, contrast: f32 },
    /// Hue rotation in degrees, saturation and value multipliers
    AdjustHsv { hue: f32, saturation: f32, value: f32 },
    /// Reveal (or hide, when `closing`) the image left to right
    Wipe { progress: f32, feather: f32, closing: bool },
}

impl ShaderStage {
    /// Stable id for the GL uniform
    pub fn index(&self) -> i32 {
        match self {
            ShaderStage::BrightnessContrast { .. } => 1,
            ShaderStage::AdjustHsv { .. } => 2,
            ShaderStage::Wipe { .. } => 3,
        }
    }

    /// Packed parameters for the GL uniform
    pub fn params(&self) -> [f32; 4] {
        match *self {
            ShaderStage::BrightnessContrast { brightness, contrast } => [brightness, contrast, 0.0, 0.0],
            ShaderStage::AdjustHsv { hue, saturation, value } => [hue, saturation, value, 0.0],
            ShaderStage::Wipe { progress, feather, closing } => {
                [progress, feather, if closing { 1.0 } else { 0.0 }, 0.0]
            }
        }
    }

    pub fn shade(&self, c: [f32; 4], uv: Vec2) -> [f32; 4] {
        match *self {
            ShaderStage::BrightnessContrast { brightness, contrast } => {
                let cf = 1.0 + contrast;
                let f = |v: f32| ((v - 0.5) * cf + 0.5 + brightness).clamp(0.0, 1.0);
                [f(c[0]), f(c[1]), f(c[2]), c[3]]
            }
            ShaderStage::AdjustHsv { hue, saturation, value } => {
                let (h, s, v) = rgb_to_hsv(c[0], c[1], c[2]);
                let h = (h + hue).rem_euclid(360.0);
                let s = (s * saturation).clamp(0.0, 1.0);
                let v = v * value;
                let (r, g, b) = hsv_to_rgb(h, s, v);
                [r, g, b, c[3]]
            }
            ShaderStage::Wipe { progress, feather, closing } => {
                let edge = if feather > 0.0 {
                    ((progress - uv.x) / feather + 0.5).clamp(0.0, 1.0)
                } else if uv.x < progress {
                    1.0
                } else {
                    0.0
                };
                let keep = if closing { 1.0 - edge } else { edge };
                [c[0], c[1], c[2], c[3] * keep]
            }
        }
    }
}

/// RGB -> HSV. H in degrees 0..360, S 0..1, V = max component.
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };

    let h = if delta.abs() < 0.0001 {
        0.0
    } else if (max - r).abs() < 0.0001 {
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < 0.0001 {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let h = if h < 0.0 { h + 360.0 } else { h };
    (h, s, v)
}

/// HSV -> RGB. V may exceed 1 for HDR content.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s <= 0.0 {
        return (v, v, v);
    }

    let h = h.rem_euclid(360.0);
    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match h_prime as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (r1 + m, g1 + m, b1 + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Zero brightness and contrast leave color untouched; alpha never changes
    #[test]
    fn test_brightness_contrast() {
        let c = [0.25, 0.5, 0.75, 0.4];
        let neutral = ShaderStage::BrightnessContrast { brightness: 0.0, contrast: 0.0 };
        assert_eq!(neutral.shade(c, Vec2::ZERO), c);

        let bright = ShaderStage::BrightnessContrast { brightness: 0.25, contrast: 0.0 };
        assert_eq!(bright.shade(c, Vec2::ZERO), [0.5, 0.75, 1.0, 0.4]);
    }

    /// Red rotated by 120 degrees becomes green
    #[test]
    fn test_hue_shift() {
        let stage = ShaderStage::AdjustHsv { hue: 120.0, saturation: 1.0, value: 1.0 };
        let out = stage.shade([1.0, 0.0, 0.0, 1.0], Vec2::ZERO);
        assert!(out[1] > 0.99 && out[0] < 0.01 && out[2] < 0.01);
    }

    /// Gray has no hue and survives any rotation
    #[test]
    fn test_gray_unchanged() {
        let (h, s, v) = rgb_to_hsv(0.5, 0.5, 0.5);
        assert!(s < 0.01);
        let (r, g, b) = hsv_to_rgb(h + 180.0, s, v);
        assert!((r - 0.5).abs() < 0.01 && (g - 0.5).abs() < 0.01 && (b - 0.5).abs() < 0.01);
    }

    /// Opening wipes keep the left part, closing wipes keep the right part
    #[test]
    fn test_wipe_sides() {
        let c = [1.0, 1.0, 1.0, 1.0];
        let open = ShaderStage::Wipe { progress: 0.5, feather: 0.0, closing: false };
        assert_eq!(open.shade(c, Vec2::new(0.25, 0.5))[3], 1.0);
        assert_eq!(open.shade(c, Vec2::new(0.75, 0.5))[3], 0.0);

        let close = ShaderStage::Wipe { progress: 0.5, feather: 0.0, closing: true };
        assert_eq!(close.shade(c, Vec2::new(0.25, 0.5))[3], 0.0);
        assert_eq!(close.shade(c, Vec2::new(0.75, 0.5))[3], 1.0);
    }
}
