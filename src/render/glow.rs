//! OpenGL graphics context through glow (feature `gpu`).
//!
//! # Architecture
//!
//! - Every render target is an FBO with one RGBA32F color texture
//! - Textures hold premultiplied color, uploaded from frames on the CPU
//! - One program covers all draws: optional effect stage, then either the
//!   fixed blend function or a blend-mode composite
//! - Blend modes read the destination through a scratch copy of the bound
//!   target (`backdrop`), refreshed before each blend-mode draw
//!
//! Row order matches the software context: memory row 0 is window y = 0, so
//! uploads and read-backs need no flip.

use anyhow::{Result, anyhow, bail};
use egui_glow::glow::{self, HasContext};
use log::{trace, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::frame::{Frame, PixelBuffer};

use super::blend::{premultiply, unpremultiply};
use super::gpu::{BlendFunc, GraphicsContext, Program, StateStack, TargetId, TextureId};
use super::quad::{QuadMesh, Vertex};

const VERTEX_SRC: &str = r#"#version 330 core
layout(location = 0) in vec3 a_pos;
layout(location = 1) in vec4 a_uv;
uniform mat4 u_mvp;
out vec4 v_uv;

void main() {
    gl_Position = u_mvp * vec4(a_pos, 1.0);
    v_uv = a_uv;
}
"#;

const FRAGMENT_SRC: &str = r#"#version 330 core
uniform sampler2D u_tex;
uniform sampler2D u_backdrop;
uniform int u_stage;      // 0 none, 1 brightness/contrast, 2 hsv, 3 wipe
uniform vec4 u_params;
uniform int u_mode;       // -1 fixed blend, otherwise blend mode id
uniform float u_opacity;

in vec4 v_uv;
out vec4 frag_color;

vec4 unpremul(vec4 c) {
    return c.a > 0.0 ? vec4(c.rgb / c.a, c.a) : vec4(0.0);
}

vec3 rgb2hsv(vec3 c) {
    vec4 K = vec4(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    vec4 p = mix(vec4(c.bg, K.wz), vec4(c.gb, K.xy), step(c.b, c.g));
    vec4 q = mix(vec4(p.xyw, c.r), vec4(c.r, p.yzx), step(p.x, c.r));
    float d = q.x - min(q.w, q.y);
    float e = 1.0e-10;
    return vec3(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

vec3 hsv2rgb(vec3 c) {
    vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
    return c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}

vec4 shade(vec4 c, vec2 st) {
    if (u_stage == 1) {
        float cf = 1.0 + u_params.y;
        return vec4(clamp((c.rgb - 0.5) * cf + 0.5 + u_params.x, 0.0, 1.0), c.a);
    } else if (u_stage == 2) {
        vec3 hsv = rgb2hsv(c.rgb);
        hsv.x = fract(hsv.x + u_params.x / 360.0);
        hsv.y = clamp(hsv.y * u_params.y, 0.0, 1.0);
        hsv.z = hsv.z * u_params.z;
        return vec4(hsv2rgb(hsv), c.a);
    } else if (u_stage == 3) {
        float edge = u_params.y > 0.0
            ? clamp((u_params.x - st.x) / u_params.y + 0.5, 0.0, 1.0)
            : (st.x < u_params.x ? 1.0 : 0.0);
        float keep = u_params.z > 0.5 ? 1.0 - edge : edge;
        return vec4(c.rgb, c.a * keep);
    }
    return c;
}

vec3 blend(vec3 bottom, vec3 top, int mode) {
    if (mode == 1) { // Screen
        return vec3(1.0) - (vec3(1.0) - bottom) * (vec3(1.0) - top);
    } else if (mode == 2) { // Add
        return min(bottom + top, vec3(1.0));
    } else if (mode == 3) { // Subtract
        return max(bottom - top, vec3(0.0));
    } else if (mode == 4) { // Multiply
        return bottom * top;
    } else if (mode == 5) { // Divide
        return mix(min(bottom / max(top, vec3(0.00001)), vec3(1.0)), bottom, step(top, vec3(0.00001)));
    } else if (mode == 6) { // Difference
        return abs(bottom - top);
    }
    return top;
}

void main() {
    vec2 st = v_uv.xy / v_uv.w;
    vec4 texel = texture(u_tex, st);

    if (u_stage != 0) {
        vec4 c = shade(unpremul(texel), st);
        texel = vec4(c.rgb * c.a, c.a);
    }

    if (u_mode < 0) {
        frag_color = texel;
        return;
    }

    vec4 bottom = texelFetch(u_backdrop, ivec2(gl_FragCoord.xy), 0);
    if (u_mode == 0) {
        frag_color = texel * u_opacity + bottom * (1.0 - texel.a * u_opacity);
        return;
    }

    vec4 b = unpremul(bottom);
    vec4 t = unpremul(texel);
    float a = t.a * u_opacity;
    vec3 rgb = b.rgb * (1.0 - a) + blend(b.rgb, t.rgb, u_mode) * a;
    float alpha = b.a * (1.0 - a) + a;
    frag_color = vec4(rgb * alpha, alpha);
}
"#;

struct GlTexture {
    texture: glow::Texture,
    width: u32,
    height: u32,
}

struct GlTarget {
    fbo: glow::Framebuffer,
    texture: TextureId,
}

/// OpenGL implementation of [`GraphicsContext`]
pub struct GlowContext {
    gl: Arc<glow::Context>,
    textures: HashMap<TextureId, GlTexture>,
    targets: HashMap<TargetId, GlTarget>,
    next_id: u32,
    state: StateStack,
    program: glow::Program,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ebo: glow::Buffer,
    backdrop: glow::Texture,
}

fn premultiplied_data(frame: &Frame) -> Vec<f32> {
    let data = frame.to_rgba_f32();
    let mut out = Vec::with_capacity(data.len());
    for c in data.chunks_exact(4) {
        out.extend_from_slice(&premultiply([c[0], c[1], c[2], c[3]]));
    }
    out
}

impl GlowContext {
    /// Compile the program and create the shared buffers
    pub fn new(gl: Arc<glow::Context>) -> Result<Self> {
        trace!("GlowContext::new() - creating OpenGL resources");
        unsafe {
            let program = compile_program(&gl)?;

            let vao = gl
                .create_vertex_array()
                .map_err(|e| anyhow!("Failed to create VAO: {}", e))?;
            gl.bind_vertex_array(Some(vao));

            let vbo = gl
                .create_buffer()
                .map_err(|e| anyhow!("Failed to create VBO: {}", e))?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));

            let ebo = gl
                .create_buffer()
                .map_err(|e| anyhow!("Failed to create EBO: {}", e))?;
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));

            let stride = std::mem::size_of::<Vertex>() as i32;
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(1, 4, glow::FLOAT, false, stride, 3 * std::mem::size_of::<f32>() as i32);
            gl.enable_vertex_attrib_array(1);
            gl.bind_vertex_array(None);

            let backdrop = gl
                .create_texture()
                .map_err(|e| anyhow!("Failed to create backdrop texture: {}", e))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(backdrop));
            set_sampling(&gl);

            trace!("GlowContext initialized successfully");
            Ok(Self {
                gl,
                textures: HashMap::new(),
                targets: HashMap::new(),
                next_id: 0,
                state: StateStack::default(),
                program,
                vao,
                vbo,
                ebo,
                backdrop,
            })
        }
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn upload(&self, texture: glow::Texture, width: u32, height: u32, data: Option<&[f32]>) {
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            set_sampling(gl);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA32F as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::FLOAT,
                glow::PixelUnpackData::Slice(data.map(|d| bytemuck::cast_slice::<f32, u8>(d))),
            );
        }
    }

    fn bound_fbo(&self) -> Result<(&GlTarget, u32, u32)> {
        let target = self
            .state
            .current
            .target
            .ok_or_else(|| anyhow!("no bound target"))?;
        let gl_target = self
            .targets
            .get(&target)
            .ok_or_else(|| anyhow!("unknown target {:?}", target))?;
        let tex = self
            .textures
            .get(&gl_target.texture)
            .ok_or_else(|| anyhow!("target {:?} lost its texture", target))?;
        Ok((gl_target, tex.width, tex.height))
    }

    fn uniform_i32(&self, name: &str, v: i32) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(self.program, name) {
                self.gl.uniform_1_i32(Some(&loc), v);
            }
        }
    }

    fn uniform_f32(&self, name: &str, v: f32) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(self.program, name) {
                self.gl.uniform_1_f32(Some(&loc), v);
            }
        }
    }
}

unsafe fn set_sampling(gl: &glow::Context) {
    unsafe {
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
    }
}

unsafe fn compile_shader(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = gl
            .create_shader(kind)
            .map_err(|e| anyhow!("Failed to create shader: {}", e))?;
        gl.shader_source(shader, src);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            bail!("Shader compilation failed: {}", log);
        }
        Ok(shader)
    }
}

unsafe fn compile_program(gl: &glow::Context) -> Result<glow::Program> {
    unsafe {
        let vertex = compile_shader(gl, glow::VERTEX_SHADER, VERTEX_SRC)?;
        let fragment = match compile_shader(gl, glow::FRAGMENT_SHADER, FRAGMENT_SRC) {
            Ok(f) => f,
            Err(e) => {
                gl.delete_shader(vertex);
                return Err(e);
            }
        };

        let program = gl
            .create_program()
            .map_err(|e| anyhow!("Failed to create program: {}", e))?;
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            bail!("Shader program linking failed: {}", log);
        }

        trace!("Compositing program compiled successfully");
        Ok(program)
    }
}

impl GraphicsContext for GlowContext {
    fn create_texture(&mut self, frame: &Frame) -> Result<TextureId> {
        let texture = unsafe { self.gl.create_texture() }
            .map_err(|e| anyhow!("Failed to create texture: {}", e))?;
        let (width, height) = (frame.width() as u32, frame.height() as u32);
        self.upload(texture, width, height, Some(&premultiplied_data(frame)));

        let id = TextureId(self.alloc_id());
        self.textures.insert(id, GlTexture { texture, width, height });
        Ok(id)
    }

    fn update_texture(&mut self, texture: TextureId, frame: &Frame) -> Result<()> {
        let (width, height) = (frame.width() as u32, frame.height() as u32);
        let gl_tex = self
            .textures
            .get(&texture)
            .map(|t| t.texture)
            .ok_or_else(|| anyhow!("update of unknown texture {:?}", texture))?;
        self.upload(gl_tex, width, height, Some(&premultiplied_data(frame)));
        if let Some(t) = self.textures.get_mut(&texture) {
            t.width = width;
            t.height = height;
        }
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.targets.values().any(|t| t.texture == texture) {
            warn!("delete_texture {:?}: owned by a render target", texture);
            return;
        }
        if let Some(t) = self.textures.remove(&texture) {
            unsafe { self.gl.delete_texture(t.texture) };
        }
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId> {
        let gl = Arc::clone(&self.gl);
        let texture = unsafe { gl.create_texture() }
            .map_err(|e| anyhow!("Failed to create target texture: {}", e))?;
        self.upload(texture, width, height, None);

        unsafe {
            let fbo = match gl.create_framebuffer() {
                Ok(fbo) => fbo,
                Err(e) => {
                    gl.delete_texture(texture);
                    bail!("Failed to create FBO: {}", e);
                }
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::TEXTURE_2D, Some(texture), 0);
            if gl.check_framebuffer_status(glow::FRAMEBUFFER) != glow::FRAMEBUFFER_COMPLETE {
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                gl.delete_framebuffer(fbo);
                gl.delete_texture(texture);
                bail!("Framebuffer incomplete");
            }
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            let tex_id = TextureId(self.alloc_id());
            self.textures.insert(tex_id, GlTexture { texture, width, height });
            let id = TargetId(self.alloc_id());
            self.targets.insert(id, GlTarget { fbo, texture: tex_id });
            trace!("create_target {:?} {}x{}", id, width, height);
            Ok(id)
        }
    }

    fn delete_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(&target) {
            unsafe { self.gl.delete_framebuffer(t.fbo) };
            if let Some(tex) = self.textures.remove(&t.texture) {
                unsafe { self.gl.delete_texture(tex.texture) };
            }
        }
    }

    fn target_texture(&self, target: TargetId) -> Option<TextureId> {
        self.targets.get(&target).map(|t| t.texture)
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    fn read_target(&mut self, target: TargetId) -> Result<Frame> {
        let t = self
            .targets
            .get(&target)
            .ok_or_else(|| anyhow!("unknown target {:?}", target))?;
        let (width, height) = self
            .texture_size(t.texture)
            .ok_or_else(|| anyhow!("target {:?} lost its texture", target))?;
        let mut data = vec![0.0f32; (width * height * 4) as usize];
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(t.fbo));
            self.gl.read_pixels(
                0,
                0,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::FLOAT,
                glow::PixelPackData::Slice(Some(bytemuck::cast_slice_mut(&mut data))),
            );
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        for px in data.chunks_exact_mut(4) {
            let c = unpremultiply([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&c);
        }
        Ok(Frame::from_buffer(PixelBuffer::F32(data), width as usize, height as usize))
    }

    fn clear(&mut self, color: [f32; 4]) {
        let fbo = match self.bound_fbo() {
            Ok((t, _, _)) => t.fbo,
            Err(e) => {
                warn!("clear: {}", e);
                return;
            }
        };
        let c = premultiply(color);
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            self.gl.clear_color(c[0], c[1], c[2], c[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn draw_mesh(&mut self, mesh: &QuadMesh) -> Result<()> {
        let state = self.state.current.clone();
        let (fbo, output, tw, th) = {
            let (t, w, h) = self.bound_fbo()?;
            (t.fbo, t.texture, w, h)
        };
        let source_id = state.texture.ok_or_else(|| anyhow!("draw without bound texture"))?;
        if source_id == output {
            warn!("draw reads and writes {:?}", output);
        }
        let source = self
            .textures
            .get(&source_id)
            .map(|t| t.texture)
            .ok_or_else(|| anyhow!("draw with unknown texture {:?}", source_id))?;
        let (vw, vh) = match state.viewport {
            (0, 0) => (tw, th),
            v => v,
        };

        let gl = Arc::clone(&self.gl);
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.viewport(0, 0, vw as i32, vh as i32);
            gl.use_program(Some(self.program));

            let (mode, opacity) = match state.program {
                Some(Program::Blend { mode, opacity }) => (mode.index() as i32, opacity),
                _ => (-1, 1.0),
            };
            let (stage, params) = match state.program {
                Some(Program::Effect(stage)) => (stage.index(), stage.params()),
                _ => (0, [0.0; 4]),
            };

            if mode >= 0 {
                // Snapshot the destination for the blend formula
                gl.active_texture(glow::TEXTURE1);
                gl.bind_texture(glow::TEXTURE_2D, Some(self.backdrop));
                gl.copy_tex_image_2d(glow::TEXTURE_2D, 0, glow::RGBA32F, 0, 0, tw as i32, th as i32, 0);
                gl.disable(glow::BLEND);
            } else {
                match state.blend {
                    BlendFunc::PremultipliedOver => {
                        gl.enable(glow::BLEND);
                        gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
                    }
                    BlendFunc::Replace => gl.disable(glow::BLEND),
                }
            }

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(source));

            if let Some(loc) = gl.get_uniform_location(self.program, "u_mvp") {
                gl.uniform_matrix_4_f32_slice(Some(&loc), false, &state.mvp().to_cols_array());
            }
            if let Some(loc) = gl.get_uniform_location(self.program, "u_params") {
                gl.uniform_4_f32(Some(&loc), params[0], params[1], params[2], params[3]);
            }
            self.uniform_i32("u_tex", 0);
            self.uniform_i32("u_backdrop", 1);
            self.uniform_i32("u_stage", stage);
            self.uniform_i32("u_mode", mode);
            self.uniform_f32("u_opacity", opacity);

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(&mesh.vertices), glow::STREAM_DRAW);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.ebo));
            gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&mesh.indices), glow::STREAM_DRAW);
            gl.draw_elements(glow::TRIANGLES, mesh.indices.len() as i32, glow::UNSIGNED_INT, 0);

            gl.bind_vertex_array(None);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.use_program(None);
        }

        trace!("draw_mesh {:?} -> {:?} ({} tris)", source_id, output, mesh.triangle_count());
        Ok(())
    }

    fn state_stack(&mut self) -> &mut StateStack {
        &mut self.state
    }
}

impl std::fmt::Debug for GlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowContext")
            .field("textures", &self.textures.len())
            .field("targets", &self.targets.len())
            .finish()
    }
}

impl Drop for GlowContext {
    fn drop(&mut self) {
        unsafe {
            for (_, t) in self.targets.drain() {
                self.gl.delete_framebuffer(t.fbo);
            }
            for (_, t) in self.textures.drain() {
                self.gl.delete_texture(t.texture);
            }
            self.gl.delete_texture(self.backdrop);
            self.gl.delete_program(self.program);
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_buffer(self.vbo);
            self.gl.delete_buffer(self.ebo);
        }
        trace!("GlowContext dropped and resources cleaned up");
    }
}
