//! Software graphics context.
//!
//! Rasterizes quad meshes on the CPU so the compositor runs headless and in
//! tests. Textures are premultiplied f32 RGBA, row 0 at the top; NDC -1 maps
//! to row 0, so `ortho(-w/2, w/2, -h/2, h/2)` puts +Y downwards.
//!
//! Triangles are filled row-parallel with rayon, sampled bilinearly with
//! clamp-to-edge, and use a top-left style tie rule so the two triangles of a
//! quad never both cover the diagonal.
//!
//! Every draw is recorded in a [`DrawRecord`] log, which tests use to check
//! which target a draw wrote and which texture it read.

use anyhow::{Result, anyhow, bail};
use glam::{Vec2, Vec4};
use log::{trace, warn};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::entities::frame::{Frame, PixelBuffer};

use super::blend::{composite_premultiplied, premultiply, unpremultiply};
use super::gpu::{BlendFunc, GpuState, GraphicsContext, Program, StateStack, TargetId, TextureId};
use super::quad::QuadMesh;

/// Premultiplied RGBA image
#[derive(Clone, Debug)]
struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; (width * height) as usize],
        }
    }

    fn from_frame(frame: &Frame) -> Self {
        let data = frame.to_rgba_f32();
        let pixels = data
            .chunks_exact(4)
            .map(|c| premultiply([c[0], c[1], c[2], c[3]]))
            .collect();
        Self {
            width: frame.width() as u32,
            height: frame.height() as u32,
            pixels,
        }
    }

    /// Bilinear sample at normalized coordinates, clamped to edge
    fn sample(&self, uv: Vec2) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 4];
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let x = (uv.x * self.width as f32 - 0.5).clamp(0.0, (w - 1) as f32);
        let y = (uv.y * self.height as f32 - 0.5).clamp(0.0, (h - 1) as f32);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = self.pixels[y0 * w + x0];
        let p10 = self.pixels[y0 * w + x1];
        let p01 = self.pixels[y1 * w + x0];
        let p11 = self.pixels[y1 * w + x1];

        let mut out = [0.0; 4];
        for c in 0..4 {
            let top = p00[c] + (p10[c] - p00[c]) * fx;
            let bottom = p01[c] + (p11[c] - p01[c]) * fx;
            out[c] = top + (bottom - top) * fy;
        }
        out
    }
}

/// One submitted draw
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub target: TargetId,
    /// Texture the target writes into
    pub output: TextureId,
    /// Texture sampled by the draw
    pub source: TextureId,
    pub program: Option<Program>,
}

/// CPU implementation of [`GraphicsContext`]
#[derive(Debug, Default)]
pub struct SoftwareContext {
    textures: HashMap<TextureId, Surface>,
    targets: HashMap<TargetId, TextureId>,
    next_id: u32,
    state: StateStack,
    draws: Vec<DrawRecord>,
    texture_limit: Option<usize>,
}

impl SoftwareContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail texture allocation once `limit` textures exist
    pub fn with_texture_limit(mut self, limit: usize) -> Self {
        self.texture_limit = Some(limit);
        self
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Straight-alpha pixel of a texture
    pub fn pixel(&self, texture: TextureId, x: u32, y: u32) -> Option<[f32; 4]> {
        let surface = self.textures.get(&texture)?;
        if x >= surface.width || y >= surface.height {
            return None;
        }
        Some(unpremultiply(surface.pixels[(y * surface.width + x) as usize]))
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_surface(&mut self, surface: Surface) -> Result<TextureId> {
        if let Some(limit) = self.texture_limit {
            if self.textures.len() >= limit {
                bail!("texture limit reached ({})", limit);
            }
        }
        let id = TextureId(self.alloc_id());
        self.textures.insert(id, surface);
        Ok(id)
    }
}

impl GraphicsContext for SoftwareContext {
    fn create_texture(&mut self, frame: &Frame) -> Result<TextureId> {
        let id = self.insert_surface(Surface::from_frame(frame))?;
        trace!("create_texture {:?} {}x{}", id, frame.width(), frame.height());
        Ok(id)
    }

    fn update_texture(&mut self, texture: TextureId, frame: &Frame) -> Result<()> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| anyhow!("update of unknown texture {:?}", texture))?;
        *slot = Surface::from_frame(frame);
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.targets.values().any(|&t| t == texture) {
            warn!("delete_texture {:?}: owned by a render target", texture);
            return;
        }
        self.textures.remove(&texture);
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId> {
        let texture = self.insert_surface(Surface::new(width, height))?;
        let id = TargetId(self.alloc_id());
        self.targets.insert(id, texture);
        trace!("create_target {:?} {}x{} -> {:?}", id, width, height, texture);
        Ok(id)
    }

    fn delete_target(&mut self, target: TargetId) {
        if let Some(texture) = self.targets.remove(&target) {
            self.textures.remove(&texture);
        }
    }

    fn target_texture(&self, target: TargetId) -> Option<TextureId> {
        self.targets.get(&target).copied()
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|s| (s.width, s.height))
    }

    fn read_target(&mut self, target: TargetId) -> Result<Frame> {
        let texture = self
            .target_texture(target)
            .ok_or_else(|| anyhow!("unknown target {:?}", target))?;
        let surface = self
            .textures
            .get(&texture)
            .ok_or_else(|| anyhow!("target {:?} lost its texture", target))?;
        let mut data = Vec::with_capacity(surface.pixels.len() * 4);
        for p in &surface.pixels {
            data.extend_from_slice(&unpremultiply(*p));
        }
        Ok(Frame::from_buffer(
            PixelBuffer::F32(data),
            surface.width as usize,
            surface.height as usize,
        ))
    }

    fn clear(&mut self, color: [f32; 4]) {
        let Some(target) = self.state.current.target else {
            warn!("clear without bound target");
            return;
        };
        let Some(texture) = self.targets.get(&target) else {
            warn!("clear of unknown target {:?}", target);
            return;
        };
        if let Some(surface) = self.textures.get_mut(texture) {
            let fill = premultiply(color);
            surface.pixels.iter_mut().for_each(|p| *p = fill);
        }
    }

    fn draw_mesh(&mut self, mesh: &QuadMesh) -> Result<()> {
        let state = self.state.current.clone();
        let target = state.target.ok_or_else(|| anyhow!("draw without bound target"))?;
        let output = *self
            .targets
            .get(&target)
            .ok_or_else(|| anyhow!("draw into unknown target {:?}", target))?;
        let source = state.texture.ok_or_else(|| anyhow!("draw without bound texture"))?;

        let mut dest = self
            .textures
            .remove(&output)
            .ok_or_else(|| anyhow!("target {:?} lost its texture", target))?;

        // Sampling the texture being written: read from a snapshot
        let snapshot;
        let src = if source == output {
            warn!("draw reads and writes {:?}", output);
            snapshot = dest.clone();
            Some(&snapshot)
        } else {
            self.textures.get(&source)
        };

        let result = match src {
            Some(src) => {
                rasterize(&mut dest, src, mesh, &state);
                Ok(())
            }
            None => Err(anyhow!("draw with unknown texture {:?}", source)),
        };
        self.textures.insert(output, dest);
        result?;

        self.draws.push(DrawRecord {
            target,
            output,
            source,
            program: state.program,
        });
        Ok(())
    }

    fn state_stack(&mut self) -> &mut StateStack {
        &mut self.state
    }
}

// ============================================================================
// Rasterizer
// ============================================================================

#[derive(Clone, Copy)]
struct ScreenVertex {
    pos: Vec2,
    uv: Vec4,
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Tie rule for pixels exactly on an edge: of two triangles sharing an edge,
/// exactly one owns it since they walk it in opposite directions.
#[inline]
fn owns_edge(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    d.y > 0.0 || (d.y == 0.0 && d.x < 0.0)
}

fn rasterize(dest: &mut Surface, src: &Surface, mesh: &QuadMesh, state: &GpuState) {
    let (vw, vh) = match state.viewport {
        (0, 0) => (dest.width, dest.height),
        v => v,
    };
    let mvp = state.mvp();

    let verts: Vec<ScreenVertex> = mesh
        .vertices
        .iter()
        .map(|v| {
            let clip = mvp * Vec4::new(v.pos[0], v.pos[1], v.pos[2], 1.0);
            let w = if clip.w.abs() > f32::EPSILON { clip.w } else { 1.0 };
            let ndc = Vec2::new(clip.x / w, clip.y / w);
            ScreenVertex {
                pos: Vec2::new((ndc.x + 1.0) * 0.5 * vw as f32, (ndc.y + 1.0) * 0.5 * vh as f32),
                uv: Vec4::from_array(v.uv),
            }
        })
        .collect();

    let limit_w = vw.min(dest.width) as usize;
    let limit_h = vh.min(dest.height) as usize;

    for tri in mesh.indices.chunks_exact(3) {
        let (Some(&a), Some(&b), Some(&c)) = (
            verts.get(tri[0] as usize),
            verts.get(tri[1] as usize),
            verts.get(tri[2] as usize),
        ) else {
            continue;
        };
        fill_triangle(dest, src, [a, b, c], limit_w, limit_h, state.program, state.blend);
    }
}

fn fill_triangle(
    dest: &mut Surface,
    src: &Surface,
    tri: [ScreenVertex; 3],
    limit_w: usize,
    limit_h: usize,
    program: Option<Program>,
    blend: BlendFunc,
) {
    let [a, mut b, mut c] = tri;
    let mut area = edge(a.pos, b.pos, c.pos);
    if area.abs() < 1e-8 {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut b, &mut c);
        area = -area;
    }

    let min = a.pos.min(b.pos).min(c.pos);
    let max = a.pos.max(b.pos).max(c.pos);
    let x0 = (min.x.floor().max(0.0) as usize).min(limit_w);
    let x1 = (max.x.ceil().max(0.0) as usize).min(limit_w);
    let y0 = (min.y.floor().max(0.0) as usize).min(limit_h);
    let y1 = (max.y.ceil().max(0.0) as usize).min(limit_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let own_bc = owns_edge(b.pos, c.pos);
    let own_ca = owns_edge(c.pos, a.pos);
    let own_ab = owns_edge(a.pos, b.pos);
    let inside = |w: f32, owned: bool| w > 0.0 || (w == 0.0 && owned);

    let width = dest.width as usize;
    let rows = &mut dest.pixels[y0 * width..y1 * width];

    rows.par_chunks_mut(width).enumerate().for_each(|(dy, row)| {
        let py = (y0 + dy) as f32 + 0.5;
        for (x, pixel) in row.iter_mut().enumerate().take(x1).skip(x0) {
            let p = Vec2::new(x as f32 + 0.5, py);
            let w0 = edge(b.pos, c.pos, p);
            let w1 = edge(c.pos, a.pos, p);
            let w2 = edge(a.pos, b.pos, p);
            if !(inside(w0, own_bc) && inside(w1, own_ca) && inside(w2, own_ab)) {
                continue;
            }

            let uv = (a.uv * w0 + b.uv * w1 + c.uv * w2) / area;
            let q = if uv.w.abs() > f32::EPSILON { uv.w } else { 1.0 };
            let st = Vec2::new(uv.x / q, uv.y / q);
            let texel = src.sample(st);

            *pixel = match program {
                Some(Program::Blend { mode, opacity }) => composite_premultiplied(*pixel, texel, opacity, mode),
                Some(Program::Effect(stage)) => {
                    let shaded = premultiply(stage.shade(unpremultiply(texel), st));
                    apply_blend_func(*pixel, shaded, blend)
                }
                None => apply_blend_func(*pixel, texel, blend),
            };
        }
    });
}

#[inline]
fn apply_blend_func(dst: [f32; 4], src: [f32; 4], blend: BlendFunc) -> [f32; 4] {
    match blend {
        BlendFunc::Replace => src,
        BlendFunc::PremultipliedOver => {
            let inv = 1.0 - src[3];
            [
                src[0] + dst[0] * inv,
                src[1] + dst[1] * inv,
                src[2] + dst[2] * inv,
                src[3] + dst[3] * inv,
            ]
        }
    }
}
