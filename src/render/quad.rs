//! Textured quad submission.
//!
//! Every draw in the compositor funnels through here: the coordinate frame is
//! turned into one vertex/index buffer (a single quad, or a grid of cells for
//! mesh warps) and submitted as one batched draw.
//!
//! Grid cells interpolate the four corners by row/column fraction. X is
//! lerped down the left and right edges first, Y across the top and bottom
//! edges first, then each is lerped along the other axis. Corner-pinned
//! quads therefore bend the same way the per-vertex immediate-mode loop did.

use anyhow::{Result, anyhow};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use log::trace;

use super::coords::{BL, BR, TL, TR, TextureCoords};
use super::gpu::{GraphicsContext, Program, TargetId, TextureId, scoped};

/// Interleaved vertex: position then projective texture coordinate
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 4],
}

impl Vertex {
    fn new(pos: Vec3, uv: Vec4) -> Self {
        Self {
            pos: pos.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// Triangle list, two triangles per quad or cell
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl QuadMesh {
    fn push_quad(&mut self, tl: Vertex, tr: Vertex, br: Vertex, bl: Vertex) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[tl, tr, br, bl]);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Build the mesh for a coordinate frame
pub fn build_mesh(coords: &TextureCoords) -> QuadMesh {
    let mut mesh = QuadMesh::default();
    let v = &coords.vertices;
    let t = &coords.tex;

    if coords.grid_size <= 1 {
        mesh.push_quad(
            Vertex::new(v[TL], t[TL]),
            Vertex::new(v[TR], t[TR]),
            Vertex::new(v[BR], t[BR]),
            Vertex::new(v[BL], t[BL]),
        );
        return mesh;
    }

    let grid = coords.grid_size;
    let step = 1.0 / grid as f32;
    let z = (v[TL].z + v[TR].z + v[BR].z + v[BL].z) * 0.25;
    mesh.vertices.reserve((grid * grid * 4) as usize);
    mesh.indices.reserve((grid * grid * 6) as usize);

    for j in 0..grid {
        let row = j as f32 * step;
        let nrow = (j + 1) as f32 * step;

        // X along left/right edges at this row band
        let v_tl_x = lerp(v[TL].x, v[BL].x, row);
        let v_tr_x = lerp(v[TR].x, v[BR].x, row);
        let v_bl_x = lerp(v[TL].x, v[BL].x, nrow);
        let v_br_x = lerp(v[TR].x, v[BR].x, nrow);

        for i in 0..grid {
            let col = i as f32 * step;
            let ncol = (i + 1) as f32 * step;

            // Y along top/bottom edges at this column band
            let v_tl_y = lerp(v[TL].y, v[TR].y, col);
            let v_tr_y = lerp(v[TL].y, v[TR].y, ncol);
            let v_bl_y = lerp(v[BL].y, v[BR].y, col);
            let v_br_y = lerp(v[BL].y, v[BR].y, ncol);

            let tl = Vertex::new(
                Vec3::new(lerp(v_tl_x, v_tr_x, col), lerp(v_tl_y, v_bl_y, row), z),
                Vec4::new(lerp(t[TL].x, t[TR].x, col), lerp(t[TL].y, t[BL].y, row), 0.0, 1.0),
            );
            let tr = Vertex::new(
                Vec3::new(lerp(v_tl_x, v_tr_x, ncol), lerp(v_tr_y, v_br_y, row), z),
                Vec4::new(lerp(t[TL].x, t[TR].x, ncol), lerp(t[TR].y, t[BR].y, row), 0.0, 1.0),
            );
            let br = Vertex::new(
                Vec3::new(lerp(v_bl_x, v_br_x, ncol), lerp(v_tr_y, v_br_y, nrow), z),
                Vec4::new(lerp(t[BL].x, t[BR].x, ncol), lerp(t[TR].y, t[BR].y, nrow), 0.0, 1.0),
            );
            let bl = Vertex::new(
                Vec3::new(lerp(v_bl_x, v_br_x, col), lerp(v_tl_y, v_bl_y, nrow), z),
                Vec4::new(lerp(t[BL].x, t[BR].x, col), lerp(t[TL].y, t[BL].y, nrow), 0.0, 1.0),
            );
            mesh.push_quad(tl, tr, br, bl);
        }
    }

    mesh
}

/// Draw `texture` full-frame into `target` and return the target's texture.
///
/// Uses a unit quad under `ortho(0, 1, 0, 1)` sized to the target, with
/// whatever program the caller has selected.
pub fn draw_clip(
    gpu: &mut dyn GraphicsContext,
    target: TargetId,
    texture: TextureId,
    clear: bool,
) -> Result<TextureId> {
    let output = gpu
        .target_texture(target)
        .ok_or_else(|| anyhow!("target {:?} has no texture", target))?;
    let (width, height) = gpu
        .texture_size(output)
        .ok_or_else(|| anyhow!("target {:?} texture missing", target))?;

    trace!("draw_clip {:?} -> {:?} clear={}", texture, target, clear);

    scoped(gpu, |gpu| {
        gpu.bind_target(target);
        gpu.set_viewport(width, height);
        if clear {
            gpu.clear([0.0; 4]);
        }
        gpu.set_projection(Mat4::orthographic_rh_gl(0.0, 1.0, 0.0, 1.0, -1.0, 10.0));
        gpu.set_modelview(Mat4::IDENTITY);
        gpu.bind_texture(Some(texture));
        gpu.draw_mesh(&build_mesh(&TextureCoords::unit()))
    })?;

    Ok(output)
}

/// Final composite of a processed clip onto the bound destination using the
/// blend-mode program with the frame's mode and opacity.
pub fn draw_composite(
    gpu: &mut dyn GraphicsContext,
    destination: TargetId,
    texture: TextureId,
    coords: &TextureCoords,
) -> Result<()> {
    trace!(
        "composite {:?} -> {:?} mode={:?} opacity={}",
        texture, destination, coords.blend_mode, coords.opacity
    );
    scoped(gpu, |gpu| {
        gpu.bind_target(destination);
        gpu.bind_texture(Some(texture));
        gpu.use_program(Some(Program::Blend {
            mode: coords.blend_mode,
            opacity: coords.opacity,
        }));
        gpu.draw_mesh(&build_mesh(coords))
    })
}
