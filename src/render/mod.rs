//! Graphics seam and backends.
//!
//! - `gpu`: the `GraphicsContext` trait, handles and state stack
//! - `quad`: mesh generation and the draw helpers everything else uses
//! - `coords`, `blend`, `shader`: per-draw value types
//! - `targets`: clip-owned ping-pong targets and deferred release
//! - `cpu`: software backend, `glow`: OpenGL backend (feature `gpu`)

pub mod blend;
pub mod coords;
pub mod cpu;
#[cfg(feature = "gpu")]
pub mod glow;
pub mod gpu;
pub mod quad;
pub mod shader;
pub mod targets;

pub use blend::BlendMode;
pub use coords::TextureCoords;
pub use cpu::SoftwareContext;
#[cfg(feature = "gpu")]
pub use glow::GlowContext;
pub use gpu::{BlendFunc, GraphicsContext, Program, TargetId, TextureId};
pub use shader::ShaderStage;
pub use targets::{ReleaseQueue, RenderTarget, TargetPair};
