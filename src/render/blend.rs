//! Blend modes used by the final composite of each clip.
//!
//! Formulas operate on straight (non-premultiplied) RGB:
//! `result = bottom * (1 - a) + blend(bottom, top) * a` where `a = top.a * opacity`.
//! Render targets store premultiplied color, so callers convert around
//! `blend_pixel` with [`premultiply`] / [`unpremultiply`].

use serde::{Deserialize, Serialize};

/// Supported blend modes for clip compositing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Screen,
    Add,
    Subtract,
    Multiply,
    Divide,
    Difference,
}

impl BlendMode {
    pub const ALL: [BlendMode; 7] = [
        BlendMode::Normal,
        BlendMode::Screen,
        BlendMode::Add,
        BlendMode::Subtract,
        BlendMode::Multiply,
        BlendMode::Divide,
        BlendMode::Difference,
    ];

    /// Mode for a `Choice` parameter index. Out-of-range maps to Normal.
    pub fn from_index(index: u32) -> Self {
        Self::ALL.get(index as usize).copied().unwrap_or_default()
    }

    /// Stable integer id, also used as the shader uniform value
    pub fn index(self) -> u32 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Screen => 1,
            BlendMode::Add => 2,
            BlendMode::Subtract => 3,
            BlendMode::Multiply => 4,
            BlendMode::Divide => 5,
            BlendMode::Difference => 6,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Screen => "Screen",
            BlendMode::Add => "Add",
            BlendMode::Subtract => "Subtract",
            BlendMode::Multiply => "Multiply",
            BlendMode::Divide => "Divide",
            BlendMode::Difference => "Difference",
        }
    }

    /// Blend one channel
    #[inline]
    pub fn channel(self, b: f32, t: f32) -> f32 {
        match self {
            BlendMode::Normal => t,
            BlendMode::Screen => 1.0 - (1.0 - b) * (1.0 - t),
            BlendMode::Add => (b + t).min(1.0),
            BlendMode::Subtract => (b - t).max(0.0),
            BlendMode::Multiply => b * t,
            BlendMode::Divide => {
                if t <= 0.00001 {
                    b
                } else {
                    (b / t).min(1.0)
                }
            }
            BlendMode::Difference => (b - t).abs(),
        }
    }
}

/// Composite straight-alpha `top` over straight-alpha `bottom`.
#[inline]
pub fn blend_pixel(bottom: [f32; 4], top: [f32; 4], opacity: f32, mode: BlendMode) -> [f32; 4] {
    let top_alpha = top[3] * opacity;
    let inv_alpha = 1.0 - top_alpha;
    [
        bottom[0] * inv_alpha + mode.channel(bottom[0], top[0]) * top_alpha,
        bottom[1] * inv_alpha + mode.channel(bottom[1], top[1]) * top_alpha,
        bottom[2] * inv_alpha + mode.channel(bottom[2], top[2]) * top_alpha,
        bottom[3] * inv_alpha + top_alpha,
    ]
}

/// Composite premultiplied `top` onto premultiplied `bottom`.
///
/// Normal is plain premultiplied over; the other modes go through the
/// straight-alpha formulas of [`blend_pixel`].
#[inline]
pub fn composite_premultiplied(bottom: [f32; 4], top: [f32; 4], opacity: f32, mode: BlendMode) -> [f32; 4] {
    match mode {
        BlendMode::Normal => {
            let inv = 1.0 - top[3] * opacity;
            [
                top[0] * opacity + bottom[0] * inv,
                top[1] * opacity + bottom[1] * inv,
                top[2] * opacity + bottom[2] * inv,
                top[3] * opacity + bottom[3] * inv,
            ]
        }
        _ => premultiply(blend_pixel(unpremultiply(bottom), unpremultiply(top), opacity, mode)),
    }
}

#[inline]
pub fn premultiply(c: [f32; 4]) -> [f32; 4] {
    [c[0] * c[3], c[1] * c[3], c[2] * c[3], c[3]]
}

#[inline]
pub fn unpremultiply(c: [f32; 4]) -> [f32; 4] {
    if c[3] <= 0.0 {
        [0.0, 0.0, 0.0, 0.0]
    } else {
        [c[0] / c[3], c[1] / c[3], c[2] / c[3], c[3]]
    }
}
