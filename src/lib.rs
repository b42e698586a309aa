//! nestcomp - recursive timeline compositor library
//!
//! Re-exports all modules for use by binary targets.

// Compositing engine (activation, effect pipeline, nesting, audio routing)
pub mod core;

// Data model and rendering backends
pub mod entities;
pub mod render;

// App modules
pub mod cli;
pub mod config;

// Re-export commonly used types from core
pub use crate::core::compositor::{FrameOutcome, TimelineCompositor};
pub use crate::core::retime::retime;

// Re-export entities
pub use entities::{Clip, Effect, Frame, Media, Sequence, SharedSequence};
