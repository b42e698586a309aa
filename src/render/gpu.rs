//! Graphics context abstraction.
//!
//! The compositor never talks to a graphics API directly. It drives a
//! `GraphicsContext`, which owns textures and render targets and keeps a small
//! piece of pipeline state (bound target, viewport, bound texture, blend
//! function, program, matrices). State is saved and restored with
//! `push_state` / `pop_state`; [`scoped`] brackets a closure with both.
//!
//! Backends:
//! - [`SoftwareContext`](super::cpu::SoftwareContext): CPU rasterizer, always available
//! - `GlowContext` (feature `gpu`): OpenGL through glow

use anyhow::Result;
use glam::Mat4;

use crate::entities::frame::Frame;

use super::blend::BlendMode;
use super::quad::QuadMesh;
use super::shader::ShaderStage;

/// Texture handle owned by a context
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Render target handle; each target renders into one texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

/// Fixed-function blend applied when no blend-mode program is active.
/// Texture contents are premultiplied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendFunc {
    /// (ONE, ONE_MINUS_SRC_ALPHA)
    #[default]
    PremultipliedOver,
    /// (ONE, ZERO)
    Replace,
}

/// Fragment program selection
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Program {
    /// Blend-mode composite against the bound target
    Blend { mode: BlendMode, opacity: f32 },
    /// Effect stage; output goes through the current blend function
    Effect(ShaderStage),
}

/// Pipeline state saved by `push_state`
#[derive(Clone, Debug, PartialEq)]
pub struct GpuState {
    pub target: Option<TargetId>,
    pub viewport: (u32, u32),
    pub texture: Option<TextureId>,
    pub blend: BlendFunc,
    pub program: Option<Program>,
    pub projection: Mat4,
    pub modelview: Mat4,
}

impl Default for GpuState {
    fn default() -> Self {
        Self {
            target: None,
            viewport: (0, 0),
            texture: None,
            blend: BlendFunc::default(),
            program: None,
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
        }
    }
}

impl GpuState {
    pub fn mvp(&self) -> Mat4 {
        self.projection * self.modelview
    }
}

/// Current state plus saved copies
#[derive(Clone, Debug, Default)]
pub struct StateStack {
    pub current: GpuState,
    saved: Vec<GpuState>,
}

impl StateStack {
    pub fn push(&mut self) {
        self.saved.push(self.current.clone());
    }

    pub fn pop(&mut self) {
        match self.saved.pop() {
            Some(state) => self.current = state,
            None => log::warn!("pop_state without matching push_state"),
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

/// Graphics primitive surface used by the compositor
pub trait GraphicsContext {
    // === Resources ===

    /// Upload a frame into a new texture (linear filtering, clamped)
    fn create_texture(&mut self, frame: &Frame) -> Result<TextureId>;

    /// Replace the contents of an existing texture; may resize it
    fn update_texture(&mut self, texture: TextureId, frame: &Frame) -> Result<()>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Allocate an offscreen target with a cleared color texture
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId>;

    fn delete_target(&mut self, target: TargetId);

    /// Texture a target renders into
    fn target_texture(&self, target: TargetId) -> Option<TextureId>;

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)>;

    /// Read a target back as straight-alpha f32 RGBA
    fn read_target(&mut self, target: TargetId) -> Result<Frame>;

    // === Drawing ===

    /// Clear the bound target
    fn clear(&mut self, color: [f32; 4]);

    /// Draw a mesh into the bound target with the bound texture and program
    fn draw_mesh(&mut self, mesh: &QuadMesh) -> Result<()>;

    // === State ===

    fn state_stack(&mut self) -> &mut StateStack;

    fn state(&mut self) -> &GpuState {
        &self.state_stack().current
    }

    fn push_state(&mut self) {
        self.state_stack().push();
    }

    fn pop_state(&mut self) {
        self.state_stack().pop();
    }

    fn bind_target(&mut self, target: TargetId) {
        self.state_stack().current.target = Some(target);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.state_stack().current.viewport = (width, height);
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.state_stack().current.texture = texture;
    }

    fn set_blend_func(&mut self, blend: BlendFunc) {
        self.state_stack().current.blend = blend;
    }

    fn use_program(&mut self, program: Option<Program>) {
        self.state_stack().current.program = program;
    }

    fn set_projection(&mut self, projection: Mat4) {
        self.state_stack().current.projection = projection;
    }

    fn set_modelview(&mut self, modelview: Mat4) {
        self.state_stack().current.modelview = modelview;
    }
}

/// Run `f` between `push_state` and `pop_state`
pub fn scoped<G, R>(gpu: &mut G, f: impl FnOnce(&mut G) -> R) -> R
where
    G: GraphicsContext + ?Sized,
{
    gpu.push_state();
    let result = f(gpu);
    gpu.pop_state();
    result
}
