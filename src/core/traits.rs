//! Collaborator interfaces the compositor consumes.
//!
//! Decoding, clip opening, audio caching and the viewer all live outside the
//! compositor. These traits are the seams; `core` ships simple in-process
//! implementations ([`ImmediateLifecycle`](super::lifecycle::ImmediateLifecycle),
//! [`StillFrameSource`](super::stills::StillFrameSource),
//! [`QueuedAudioCache`](super::audio::QueuedAudioCache)).

use crate::entities::clip::Clip;
use crate::entities::frame::Frame;

use super::audio::AudioCacheRequest;

/// Opens and closes clip media. Both calls must be idempotent.
pub trait ClipLifecycle {
    /// Bind the clip's media stream. `preview` requests reduced quality.
    fn open(&mut self, clip: &mut Clip, preview: bool);

    /// Unbind the clip's media. Without `force`, in-flight background work
    /// may finish first.
    fn close(&mut self, clip: &mut Clip, force: bool);
}

/// Result of asking for a decoded frame
#[derive(Debug, Clone)]
pub enum FrameFetch {
    Ready(Frame),
    /// Not decoded yet; the caller should redraw later
    Pending,
}

/// Decoded frames for footage clips
pub trait FrameSource {
    /// Frame of `clip` at sequence frame `playhead`
    fn frame_at(&self, clip: &Clip, playhead: i64) -> FrameFetch;
}

/// Background audio sample cache
pub trait AudioCache {
    /// True if an audio output device is configured
    fn device_available(&self) -> bool;

    /// Start caching. Must return without waiting for the work.
    fn cache(&self, request: AudioCacheRequest);
}

/// Viewer callbacks
pub trait ViewerHooks {
    /// No audio clip governs timing this frame; let the clock run on its own
    fn play_wake(&mut self);
}
