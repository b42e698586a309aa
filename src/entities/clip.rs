//! Clip: a placement of media on a sequence track.
//!
//! Timing is in frames of the owning sequence. Opening and closing
//! transitions may extend the clip past its nominal in/out points; the
//! `*_with_transition` accessors give the extended bounds used for
//! activation and drawing.
//!
//! GPU resources (target pair, decode texture, generated textures) are
//! owned by the clip and handed to a [`ReleaseQueue`] when it closes.

use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::effects::{Effect, EffectKind, TransitionEdge};
use super::media::Media;
use crate::render::gpu::TextureId;
use crate::render::targets::{ReleaseQueue, TargetPair};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClipId(pub Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open/close lifecycle. `Open` is "finished opening".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipState {
    #[default]
    Closed,
    /// Open requested, media not yet serving frames
    Opening,
    Open,
}

/// Effect bound to one edge of a clip for `length` frames
#[derive(Clone, Debug)]
pub struct Transition {
    pub edge: TransitionEdge,
    pub length: i64,
    /// Frames the transition extends the clip beyond its in/out point
    pub extension: i64,
    pub effect: Effect,
}

impl Transition {
    pub fn new(edge: TransitionEdge, kind: impl Into<EffectKind>, length: i64) -> Self {
        Self {
            edge,
            length,
            extension: 0,
            effect: Effect::new(kind),
        }
    }

    pub fn opening(kind: impl Into<EffectKind>, length: i64) -> Self {
        Self::new(TransitionEdge::Opening, kind, length)
    }

    pub fn closing(kind: impl Into<EffectKind>, length: i64) -> Self {
        Self::new(TransitionEdge::Closing, kind, length)
    }

    pub fn with_extension(mut self, extension: i64) -> Self {
        self.extension = extension;
        self
    }

    /// Normalized progress for `elapsed` frames into the transition, if
    /// it falls within `[0, length)`
    pub fn progress(&self, elapsed: i64) -> Option<f64> {
        (self.length > 0 && (0..self.length).contains(&elapsed)).then(|| elapsed as f64 / self.length as f64)
    }
}

#[derive(Debug)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub media: Media,
    /// Stream index inside the footage file
    pub media_stream: usize,
    /// Negative = video, non-negative = audio
    pub track: i32,
    pub enabled: bool,
    pub timeline_in: i64,
    pub timeline_out: i64,
    /// Source frame shown at `timeline_in`
    pub clip_in: i64,
    pub effects: Vec<Effect>,
    pub opening_transition: Option<Transition>,
    pub closing_transition: Option<Transition>,
    pub autoscale: bool,
    /// Selected in the timeline
    pub selected: bool,
    /// Ask the audio cache to drop its state on the next request
    pub audio_reset: bool,
    pub state: ClipState,
    pub targets: Option<TargetPair>,
    /// Decode texture for footage
    pub texture: Option<TextureId>,
    /// Held while an audio cache request is being issued
    pub cache_lock: Arc<Mutex<()>>,
}

impl Clip {
    pub fn new(name: impl Into<String>, media: Media, track: i32, timeline_in: i64, timeline_out: i64) -> Self {
        Self {
            id: ClipId::new(),
            name: name.into(),
            media,
            media_stream: 0,
            track,
            enabled: true,
            timeline_in,
            timeline_out,
            clip_in: 0,
            effects: Vec::new(),
            opening_transition: None,
            closing_transition: None,
            autoscale: true,
            selected: false,
            audio_reset: false,
            state: ClipState::Closed,
            targets: None,
            texture: None,
            cache_lock: Arc::new(Mutex::new(())),
        }
    }

    // --- Builders ---

    pub fn with_clip_in(mut self, clip_in: i64) -> Self {
        self.clip_in = clip_in;
        self
    }

    pub fn with_stream(mut self, stream: usize) -> Self {
        self.media_stream = stream;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_opening(mut self, transition: Transition) -> Self {
        self.opening_transition = Some(transition);
        self
    }

    pub fn with_closing(mut self, transition: Transition) -> Self {
        self.closing_transition = Some(transition);
        self
    }

    pub fn with_autoscale(mut self, autoscale: bool) -> Self {
        self.autoscale = autoscale;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    // --- Kind and state ---

    pub fn is_video(&self) -> bool {
        self.track < 0
    }

    pub fn is_open(&self) -> bool {
        self.state != ClipState::Closed
    }

    pub fn finished_opening(&self) -> bool {
        self.state == ClipState::Open
    }

    // --- Timing ---

    pub fn timeline_in_with_transition(&self) -> i64 {
        self.timeline_in - self.opening_transition.as_ref().map_or(0, |t| t.extension)
    }

    pub fn timeline_out_with_transition(&self) -> i64 {
        self.timeline_out + self.closing_transition.as_ref().map_or(0, |t| t.extension)
    }

    pub fn clip_in_with_transition(&self) -> i64 {
        self.clip_in - self.opening_transition.as_ref().map_or(0, |t| t.extension)
    }

    pub fn length(&self) -> i64 {
        self.timeline_out - self.timeline_in
    }

    /// Enabled and `playhead` inside `[in_wt, out_wt)`
    pub fn is_active_at(&self, playhead: i64) -> bool {
        self.enabled
            && playhead >= self.timeline_in_with_transition()
            && playhead < self.timeline_out_with_transition()
    }

    /// Clip-local time in seconds, used for keyframes and effect evaluation
    pub fn timecode(&self, playhead: i64, frame_rate: f64) -> f64 {
        let local = playhead - self.timeline_in_with_transition() + self.clip_in_with_transition();
        if frame_rate > 0.0 { local as f64 / frame_rate } else { 0.0 }
    }

    /// Normalized opening progress at `playhead`, while it runs
    pub fn opening_progress(&self, playhead: i64) -> Option<f64> {
        let t = self.opening_transition.as_ref()?;
        t.progress(playhead - self.timeline_in_with_transition())
    }

    /// Normalized closing progress. The window is the last `length` frames
    /// before `timeline_out_with_transition`.
    pub fn closing_progress(&self, playhead: i64) -> Option<f64> {
        let t = self.closing_transition.as_ref()?;
        t.progress(playhead - (self.timeline_out_with_transition() - t.length))
    }

    /// Native resolution of the media; `fallback` when unknown
    pub fn native_size(&self, fallback: (u32, u32)) -> (u32, u32) {
        match &self.media {
            Media::Footage(footage) => footage
                .stream_for_index(true, self.media_stream)
                .map(|s| (s.width, s.height))
                .filter(|&(w, h)| w > 0 && h > 0)
                .unwrap_or(fallback),
            // A nested sequence already borrowed is a cycle; the compositor reports it
            Media::Sequence(seq) => seq.try_borrow().map(|s| s.size()).unwrap_or(fallback),
            Media::Null => fallback,
        }
    }

    /// Chain effects followed by opening and closing transitions
    pub fn all_effects_mut(&mut self) -> impl Iterator<Item = &mut Effect> {
        self.effects
            .iter_mut()
            .chain(self.opening_transition.iter_mut().map(|t| &mut t.effect))
            .chain(self.closing_transition.iter_mut().map(|t| &mut t.effect))
    }

    /// Hand every GPU handle the clip owns to `queue`
    pub fn release_gpu(&mut self, queue: &mut ReleaseQueue) {
        if let Some(pair) = self.targets.take() {
            queue.pair(pair);
        }
        if let Some(texture) = self.texture.take() {
            queue.texture(texture);
        }
        for effect in self.all_effects_mut() {
            if let Some(texture) = effect.generated.take() {
                queue.texture(texture);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::effects::{CrossDissolve, Transform};
    use crate::entities::footage::Footage;
    use crate::entities::sequence::Sequence;

    /// Extensions widen the active window on both sides
    #[test]
    fn test_transition_extension() {
        let clip = Clip::new("a", Media::Null, -1, 10, 20)
            .with_clip_in(5)
            .with_opening(Transition::opening(CrossDissolve, 4).with_extension(2))
            .with_closing(Transition::closing(CrossDissolve, 4).with_extension(3));
        assert_eq!(clip.timeline_in_with_transition(), 8);
        assert_eq!(clip.timeline_out_with_transition(), 23);
        assert_eq!(clip.clip_in_with_transition(), 3);
        assert!(!clip.is_active_at(7));
        assert!(clip.is_active_at(8));
        assert!(clip.is_active_at(22));
        assert!(!clip.is_active_at(23));
    }

    /// Opening transition of length 10 from frame 0: half way at 5, done at 15
    #[test]
    fn test_opening_progress() {
        let clip = Clip::new("a", Media::Null, -1, 0, 100).with_opening(Transition::opening(CrossDissolve, 10));
        assert_eq!(clip.opening_progress(5), Some(0.5));
        assert_eq!(clip.opening_progress(0), Some(0.0));
        assert_eq!(clip.opening_progress(10), None);
        assert_eq!(clip.opening_progress(15), None);
    }

    /// Closing window is the last `length` frames before the extended out point
    #[test]
    fn test_closing_progress() {
        let clip = Clip::new("a", Media::Null, -1, 0, 100).with_closing(Transition::closing(CrossDissolve, 10));
        assert_eq!(clip.closing_progress(89), None);
        assert_eq!(clip.closing_progress(90), Some(0.0));
        assert_eq!(clip.closing_progress(95), Some(0.5));
        assert_eq!(clip.closing_progress(99), Some(0.9));
        assert_eq!(clip.closing_progress(100), None);
    }

    /// Disabled clips are never active
    #[test]
    fn test_disabled_inactive() {
        let mut clip = Clip::new("a", Media::Null, -1, 0, 10);
        clip.enabled = false;
        assert!(!clip.is_active_at(5));
    }

    /// Native size comes from the selected stream or nested sequence
    #[test]
    fn test_native_size() {
        let footage = Clip::new("f", Footage::video("f.png", 320, 240, 24.0, 10).into(), -1, 0, 10);
        assert_eq!(footage.native_size((1920, 1080)), (320, 240));
        assert_eq!(footage.with_stream(3).native_size((1920, 1080)), (1920, 1080));

        let seq = Sequence::new("n", 640, 480, 30.0).shared();
        let nested = Clip::new("n", Media::Sequence(seq), -1, 0, 10);
        assert_eq!(nested.native_size((1, 1)), (640, 480));
        assert_eq!(Clip::new("x", Media::Null, -1, 0, 1).native_size((7, 9)), (7, 9));
    }

    /// Clip-local time counts from the clip in-point in seconds
    #[test]
    fn test_timecode() {
        let clip = Clip::new("a", Media::Null, -1, 30, 90).with_clip_in(15);
        assert_eq!(clip.timecode(45, 30.0), 1.0);
    }

    /// Releasing queues every handle and leaves the clip empty
    #[test]
    fn test_release_gpu() {
        use crate::render::cpu::SoftwareContext;
        use crate::render::gpu::GraphicsContext;

        let mut gpu = SoftwareContext::new();
        let mut clip = Clip::new("a", Media::Null, -1, 0, 10).with_effect(Effect::new(Transform));
        clip.targets = Some(TargetPair::allocate(&mut gpu, 4, 4).unwrap());
        clip.texture = Some(gpu.create_texture(&crate::entities::frame::Frame::new(2, 2)).unwrap());
        clip.effects[0].generated = Some(gpu.create_texture(&crate::entities::frame::Frame::new(2, 2)).unwrap());

        let mut queue = ReleaseQueue::new();
        clip.release_gpu(&mut queue);
        assert!(clip.targets.is_none() && clip.texture.is_none() && clip.effects[0].generated.is_none());
        assert_eq!(queue.len(), 4);
        queue.flush(&mut gpu);
        assert_eq!(gpu.texture_count(), 0);
    }
}
