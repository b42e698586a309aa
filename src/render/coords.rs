//! Per-draw compositing frame.
//!
//! Rebuilt for every clip draw from the clip's native size, then mutated in
//! place by coordinate effects. Never persisted.

use glam::{Vec3, Vec4};

use super::blend::BlendMode;

/// Corner order used throughout: top-left, top-right, bottom-right, bottom-left.
pub const TL: usize = 0;
pub const TR: usize = 1;
pub const BR: usize = 2;
pub const BL: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct TextureCoords {
    /// Corner positions in sequence space (origin at frame center, Y down)
    pub vertices: [Vec3; 4],
    /// Corner texture coordinates (s, t, r, q). q > 1 gives projective warps.
    pub tex: [Vec4; 4],
    /// Subdivisions per side for mesh warps; 1 = plain quad
    pub grid_size: u32,
    pub blend_mode: BlendMode,
    pub opacity: f32,
}

impl TextureCoords {
    /// Default frame for a clip of `width` x `height`, centered at the origin
    pub fn for_clip(width: f32, height: f32) -> Self {
        let hw = width * 0.5;
        let hh = height * 0.5;
        Self {
            vertices: [
                Vec3::new(-hw, -hh, 1.0),
                Vec3::new(hw, -hh, 1.0),
                Vec3::new(hw, hh, 1.0),
                Vec3::new(-hw, hh, 1.0),
            ],
            tex: [
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 1.0, 0.0, 1.0),
                Vec4::new(0.0, 1.0, 0.0, 1.0),
            ],
            grid_size: 1,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
        }
    }

    /// Unit quad covering 0..1 in both axes, used for target-to-target draws
    pub fn unit() -> Self {
        let mut coords = Self::for_clip(1.0, 1.0);
        for v in coords.vertices.iter_mut() {
            v.x += 0.5;
            v.y += 0.5;
        }
        coords
    }

    /// Apply `f` to every corner position
    pub fn map_vertices(&mut self, f: impl Fn(Vec3) -> Vec3) {
        for v in self.vertices.iter_mut() {
            *v = f(*v);
        }
    }

    pub fn width(&self) -> f32 {
        self.vertices[TR].x - self.vertices[TL].x
    }

    pub fn height(&self) -> f32 {
        self.vertices[BL].y - self.vertices[TL].y
    }
}
