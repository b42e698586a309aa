//! Frame-rate retiming and the nesting stack.
//!
//! A nested sequence's playhead is derived from the root playhead by
//! walking the stack outermost first: offset by the nest clip's in-points,
//! then rescale from the parent's rate to the child's.

use crate::entities::clip::{Clip, ClipId};
use crate::render::gpu::TargetId;

/// Convert a frame number between rates, rounding to the nearest frame
pub fn retime(frame: i64, from: f64, to: f64) -> i64 {
    if from <= 0.0 || to <= 0.0 || from == to {
        return frame;
    }
    (frame as f64 / from * to).round() as i64
}

/// One level of nesting: the clip that holds a nested sequence, captured by
/// value so the stack can be shared with background work
#[derive(Clone, Debug, PartialEq)]
pub struct NestEntry {
    pub clip: ClipId,
    pub clip_in: i64,
    pub timeline_in_with_transition: i64,
    /// Frame rate of the sequence holding the clip
    pub parent_rate: f64,
    /// Frame rate of the nested sequence
    pub child_rate: f64,
    /// First target of the clip's pair, the nested sequence renders here
    pub target: Option<TargetId>,
}

impl NestEntry {
    pub fn new(clip: &Clip, parent_rate: f64, child_rate: f64) -> Self {
        Self {
            clip: clip.id,
            clip_in: clip.clip_in,
            timeline_in_with_transition: clip.timeline_in_with_transition(),
            parent_rate,
            child_rate,
            target: clip.targets.as_ref().map(|p| p.first().target),
        }
    }

    /// Map a parent playhead into the nested sequence
    pub fn apply(&self, playhead: i64) -> i64 {
        retime(
            playhead + self.clip_in - self.timeline_in_with_transition,
            self.parent_rate,
            self.child_rate,
        )
    }
}

/// Working playhead at the innermost level of `nests`
pub fn retime_through(nests: &[NestEntry], playhead: i64) -> i64 {
    nests.iter().fold(playhead, |p, nest| nest.apply(p))
}
