//! Entities module - the timeline data model the compositor reads.
//!
//! - `sequence`: clips on tracks with a size and frame rate
//! - `clip`: media placement, timing, effect chain, owned GPU handles
//! - `media`, `footage`: what a clip shows
//! - `effects`, `params`: effect kinds and their keyframed parameters
//! - `frame`, `loader`: pixel buffers and image file I/O

pub mod clip;
pub mod effects;
pub mod footage;
pub mod frame;
pub mod loader;
pub mod media;
pub mod params;
pub mod sequence;

pub use clip::{Clip, ClipId, ClipState, Transition};
pub use effects::{Effect, EffectCaps, EffectKind, EffectOps, Gizmo, TransitionArg, TransitionEdge};
pub use footage::{Footage, FootageStream};
pub use frame::Frame;
pub use loader::Loader;
pub use media::{Media, MediaKind};
pub use params::{EffectRow, ParamField, ParamValue, RowAccess};
pub use sequence::{Sequence, SharedSequence};
