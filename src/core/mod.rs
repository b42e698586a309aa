//! Compositing engine - activation, effect pipeline, nesting, audio routing
//!
//! These modules render timeline frames, independent of any viewer.

pub mod activation;
pub mod audio;
pub mod compositor;
pub mod gizmo;
pub mod lifecycle;
pub mod pipeline;
pub mod retime;
pub mod stills;
pub mod traits;

// Re-exports for convenience
pub use activation::{Activation, Pass};
pub use audio::{AudioCacheRequest, QueuedAudioCache};
pub use compositor::{FrameOutcome, TimelineCompositor};
pub use gizmo::{GizmoRef, GizmoSelector};
pub use lifecycle::ImmediateLifecycle;
pub use retime::{NestEntry, retime};
pub use stills::StillFrameSource;
pub use traits::{AudioCache, ClipLifecycle, FrameFetch, FrameSource, ViewerHooks};
