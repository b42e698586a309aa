//! Timeline compositor: renders one frame of a sequence, recursing into
//! nested sequences.
//!
//! A frame is either a video pass (clips on negative tracks, drawn into a
//! destination target) or an audio pass (clips on non-negative tracks,
//! routed to the audio cache). Both walk the same recursion:
//!
//! ```text
//! compose(seq)
//!   playhead = retime_through(nests, root)
//!   resolve active clips, opening / closing as needed
//!   for clip in active:
//!     video: source (decode | compose(nested)) -> effects -> transitions -> composite
//!     audio: compose(nested) | cache request
//! ```
//!
//! Per-frame state lives in [`FrameContext`] and is threaded through the
//! recursion. The nest stack is pushed right before a nested call and popped
//! right after it.

use glam::{Mat4, Vec3};
use log::{debug, trace, warn};
use std::rc::Rc;

use crate::config::ComposeSettings;
use crate::entities::clip::Clip;
use crate::entities::effects::TransitionArg;
use crate::entities::media::{Media, MediaKind};
use crate::entities::sequence::{SharedSequence, Sequence};
use crate::render::coords::TextureCoords;
use crate::render::gpu::{BlendFunc, GraphicsContext, TargetId, TextureId};
use crate::render::quad::draw_composite;
use crate::render::targets::{ReleaseQueue, TargetPair};

use super::activation::{Pass, ResolveEnv, resolve};
use super::audio;
use super::gizmo::{GizmoCandidates, GizmoRef, GizmoSelector};
use super::pipeline::{ClipDraw, apply_effect, upload_frame};
use super::retime::{NestEntry, retime_through};
use super::traits::{AudioCache, ClipLifecycle, FrameFetch, FrameSource, ViewerHooks};

/// What a composed frame reports back to the viewer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutcome {
    /// Composited output (video pass only)
    pub texture: Option<TextureId>,
    /// Some input was not ready; draw this frame again later
    pub needs_redraw: bool,
    /// The authoritative gizmo effect changed
    pub gizmo_changed: bool,
    /// Active audio footage clips across all nesting levels
    pub audio_active: usize,
}

/// Per-frame state threaded through the recursion
#[derive(Debug)]
struct FrameContext {
    pass: Pass,
    nests: Vec<NestEntry>,
    root_playhead: i64,
    render_audio: bool,
    speed: f64,
    retry: bool,
    audio_active: usize,
    gizmo_changed: bool,
}

impl FrameContext {
    fn new(pass: Pass, root_playhead: i64, render_audio: bool, speed: f64) -> Self {
        Self {
            pass,
            nests: Vec::new(),
            root_playhead,
            render_audio,
            speed,
            retry: false,
            audio_active: 0,
            gizmo_changed: false,
        }
    }

    fn is_root(&self) -> bool {
        self.nests.is_empty()
    }

    fn outcome(&self, texture: Option<TextureId>) -> FrameOutcome {
        FrameOutcome {
            texture,
            needs_redraw: self.retry,
            gizmo_changed: self.gizmo_changed,
            audio_active: self.audio_active,
        }
    }
}

/// One sequence level of a video pass
#[derive(Clone, Copy, Debug)]
struct Level {
    playhead: i64,
    size: (u32, u32),
    frame_rate: f64,
    target: TargetId,
}

pub struct TimelineCompositor {
    settings: ComposeSettings,
    lifecycle: Box<dyn ClipLifecycle>,
    frames: Box<dyn FrameSource>,
    audio: Box<dyn AudioCache>,
    hooks: Option<Box<dyn ViewerHooks>>,
    gizmo: GizmoSelector,
    scrubbing: bool,
    release: ReleaseQueue,
}

impl TimelineCompositor {
    pub fn new(
        settings: ComposeSettings,
        lifecycle: impl ClipLifecycle + 'static,
        frames: impl FrameSource + 'static,
        audio: impl AudioCache + 'static,
    ) -> Self {
        Self {
            settings,
            lifecycle: Box::new(lifecycle),
            frames: Box::new(frames),
            audio: Box::new(audio),
            hooks: None,
            gizmo: GizmoSelector::new(),
            scrubbing: false,
            release: ReleaseQueue::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: impl ViewerHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn settings(&self) -> &ComposeSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ComposeSettings {
        &mut self.settings
    }

    /// Effect whose gizmos the viewer should show
    pub fn gizmo(&self) -> Option<GizmoRef> {
        self.gizmo.current()
    }

    /// Viewer is dragging the playhead; enables scrub audio
    pub fn set_scrubbing(&mut self, scrubbing: bool) {
        self.scrubbing = scrubbing;
    }

    /// Force-close a clip and queue its GPU handles
    pub fn close_clip(&mut self, clip: &mut Clip) {
        if clip.is_open() {
            self.lifecycle.close(clip, true);
        }
        clip.release_gpu(&mut self.release);
    }

    /// Force-close every clip of `sequence` and of the sequences it nests
    pub fn close_all(&mut self, sequence: &SharedSequence) {
        let Ok(mut seq) = sequence.try_borrow_mut() else {
            return;
        };
        for clip in seq.clips.iter_mut() {
            if let Some(nested) = clip.media.as_sequence().map(Rc::clone) {
                self.close_all(&nested);
            }
            self.close_clip(clip);
        }
    }

    /// Free GPU handles of closed clips
    pub fn flush_released(&mut self, gpu: &mut dyn GraphicsContext) {
        self.release.flush(gpu);
    }

    /// Handles waiting for the next video frame
    pub fn pending_release(&self) -> usize {
        self.release.len()
    }

    // === Frames ===

    /// Composite `sequence` at `playhead` over `destination`. The caller
    /// owns the destination and clears it between frames.
    pub fn compose_video_frame(
        &mut self,
        gpu: &mut dyn GraphicsContext,
        sequence: &SharedSequence,
        playhead: i64,
        destination: TargetId,
    ) -> FrameOutcome {
        self.release.flush(gpu);
        let mut ctx = FrameContext::new(Pass::Video, playhead, false, self.settings.playback_speed);
        self.compose_video(gpu, &mut ctx, sequence, destination);
        ctx.outcome(gpu.target_texture(destination))
    }

    /// Route the audio clips of `sequence` at `playhead` to the audio cache
    pub fn compose_audio_frame(
        &mut self,
        sequence: &SharedSequence,
        playhead: i64,
        render_audio: bool,
        speed: f64,
    ) -> FrameOutcome {
        let mut ctx = FrameContext::new(Pass::Audio, playhead, render_audio, speed);
        self.compose_audio(&mut ctx, sequence);
        if ctx.audio_active == 0 {
            if let Some(hooks) = self.hooks.as_mut() {
                trace!("No active audio, waking playback clock");
                hooks.play_wake();
            }
        }
        ctx.outcome(None)
    }

    // === Recursion ===

    fn resolve_level(&mut self, ctx: &mut FrameContext, seq: &mut Sequence, playhead: i64) -> Vec<usize> {
        let mut env = ResolveEnv {
            lifecycle: &mut *self.lifecycle,
            audio_device: self.audio.device_available(),
            preview: !self.settings.rendering,
            release: &mut self.release,
        };
        let activation = resolve(seq, playhead, ctx.pass, &mut env);
        ctx.retry |= activation.retry;
        ctx.audio_active += activation.audio_active;
        activation.clips
    }

    /// Composite one sequence level into `target`. Returns the target's
    /// texture when called for a nested sequence.
    fn compose_video(
        &mut self,
        gpu: &mut dyn GraphicsContext,
        ctx: &mut FrameContext,
        sequence: &SharedSequence,
        target: TargetId,
    ) -> Option<TextureId> {
        let Ok(mut seq) = sequence.try_borrow_mut() else {
            warn!("Cycle detected in compose: sequence is already being drawn, skipping");
            return None;
        };
        let playhead = retime_through(&ctx.nests, ctx.root_playhead);
        let active = self.resolve_level(ctx, &mut seq, playhead);

        let level = Level {
            playhead,
            size: seq.size(),
            frame_rate: seq.frame_rate,
            target,
        };
        let (w, h) = (level.size.0 as f32, level.size.1 as f32);

        gpu.push_state();
        gpu.bind_target(target);
        gpu.set_viewport(level.size.0, level.size.1);
        if !ctx.is_root() {
            gpu.clear([0.0; 4]);
        }
        gpu.set_projection(Mat4::orthographic_rh_gl(-w / 2.0, w / 2.0, -h / 2.0, h / 2.0, -1.0, 10.0));
        gpu.set_modelview(Mat4::IDENTITY);
        gpu.set_blend_func(BlendFunc::PremultipliedOver);

        for index in active {
            let clip = &mut seq.clips[index];
            if !ready_to_compose(clip) {
                ctx.retry = true;
                continue;
            }
            self.draw_video_clip(gpu, ctx, clip, level);
        }
        if ctx.is_root() {
            sync_keyframes(&mut seq, playhead);
        }

        gpu.pop_state();

        if ctx.is_root() {
            None
        } else {
            gpu.target_texture(target)
        }
    }

    fn compose_audio(&mut self, ctx: &mut FrameContext, sequence: &SharedSequence) {
        let Ok(mut seq) = sequence.try_borrow_mut() else {
            warn!("Cycle detected in compose: sequence is already being mixed, skipping");
            return;
        };
        let playhead = retime_through(&ctx.nests, ctx.root_playhead);
        let active = self.resolve_level(ctx, &mut seq, playhead);
        let frame_rate = seq.frame_rate;

        for index in active {
            let clip = &mut seq.clips[index];
            if !ready_to_compose(clip) {
                ctx.retry = true;
                continue;
            }
            self.route_audio(ctx, clip, playhead, frame_rate);
        }
        if ctx.is_root() {
            sync_keyframes(&mut seq, playhead);
        }
    }

    // === Video ===

    fn draw_video_clip(&mut self, gpu: &mut dyn GraphicsContext, ctx: &mut FrameContext, clip: &mut Clip, level: Level) {
        let native = clip.native_size(level.size);
        if clip.targets.as_ref().is_none_or(|p| p.size() != native) {
            if let Some(stale) = clip.targets.take() {
                self.release.pair(stale);
            }
            match TargetPair::allocate(gpu, native.0, native.1) {
                Ok(pair) => {
                    debug!("Allocated {}x{} targets for '{}'", native.0, native.1, clip.name);
                    clip.targets = Some(pair);
                }
                Err(e) => {
                    warn!("Skipping clip '{}': {}", clip.name, e);
                    return;
                }
            }
        }

        let Some(mut pair) = clip.targets.take() else {
            return;
        };
        pair.reset();
        self.render_clip(gpu, ctx, clip, &mut pair, native, level);
        clip.targets = Some(pair);
    }

    fn render_clip(
        &mut self,
        gpu: &mut dyn GraphicsContext,
        ctx: &mut FrameContext,
        clip: &mut Clip,
        pair: &mut TargetPair,
        native: (u32, u32),
        level: Level,
    ) {
        let source = match clip.media.kind() {
            MediaKind::Footage => match self.decode(gpu, ctx, clip, level.playhead) {
                Some(texture) => Some(texture),
                None => return,
            },
            MediaKind::Sequence => {
                let Some(nested) = clip.media.as_sequence().map(Rc::clone) else {
                    return;
                };
                let Ok(child_rate) = nested.try_borrow().map(|s| s.frame_rate) else {
                    warn!("Cycle detected in compose: '{}' nests a sequence being drawn", clip.name);
                    return;
                };
                let mut entry = NestEntry::new(clip, level.frame_rate, child_rate);
                let first = pair.first().target;
                entry.target = Some(first);

                ctx.nests.push(entry);
                let texture = self.compose_video(gpu, ctx, &nested, first);
                ctx.nests.pop();

                pair.swap();
                texture
            }
            MediaKind::Null => None,
        };

        gpu.push_state();

        if clip.autoscale && native != level.size {
            let scale = (level.size.0 as f32 / native.0 as f32).min(level.size.1 as f32 / native.1 as f32);
            gpu.set_modelview(Mat4::from_scale(Vec3::new(scale, scale, 1.0)));
        }

        let time = clip.timecode(level.playhead, level.frame_rate);
        let shaders = self.settings.shaders_enabled;
        let mut draw = ClipDraw::new(pair, TextureCoords::for_clip(native.0 as f32, native.1 as f32), source);
        let mut seen = GizmoCandidates::default();

        for effect in clip.effects.iter_mut() {
            apply_effect(gpu, &mut draw, effect, time, TransitionArg::NoTransition, shaders);
            seen.offer(effect);
        }

        if ctx.is_root() && self.gizmo.select(clip.id, clip.selected, seen) {
            ctx.gizmo_changed = true;
        }

        let progress = (clip.opening_progress(level.playhead), clip.closing_progress(level.playhead));
        let opening = progress.0.zip(clip.opening_transition.as_mut());
        let closing = progress.1.zip(clip.closing_transition.as_mut());
        for (progress, t) in opening.into_iter().chain(closing) {
            trace!("'{}' {:?} transition {:.3}", clip.name, t.edge, progress);
            apply_effect(gpu, &mut draw, &mut t.effect, progress, t.edge.into(), shaders);
        }

        ctx.retry |= draw.retry;

        match draw.texture {
            Some(texture) => {
                gpu.set_viewport(level.size.0, level.size.1);
                if let Err(e) = draw_composite(gpu, level.target, texture, &draw.coords) {
                    warn!("Composite of '{}' failed: {}", clip.name, e);
                }
            }
            None => trace!("'{}' has nothing to draw", clip.name),
        }

        if ctx.is_root() && self.gizmo.is_current(clip.id, &seen) {
            if let Some(current) = self.gizmo.current() {
                let mvp = gpu.state().mvp();
                if let Some(effect) = clip.effects.iter_mut().find(|e| e.uuid == current.effect) {
                    GizmoSelector::layout(effect, time, &draw.coords, mvp, level.size);
                }
            }
        }

        gpu.pop_state();
    }

    /// Decoded texture for a footage clip. None skips the clip this frame.
    fn decode(&mut self, gpu: &mut dyn GraphicsContext, ctx: &mut FrameContext, clip: &mut Clip, playhead: i64) -> Option<TextureId> {
        match self.frames.frame_at(clip, playhead.max(clip.timeline_in)) {
            FrameFetch::Ready(frame) => match upload_frame(gpu, &mut clip.texture, &frame) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    warn!("Skipping clip '{}': texture upload failed: {}", clip.name, e);
                    None
                }
            },
            FrameFetch::Pending => {
                trace!("Frame for '{}' not decoded yet", clip.name);
                ctx.retry = true;
                clip.texture
            }
        }
    }

    // === Audio ===

    fn route_audio(&mut self, ctx: &mut FrameContext, clip: &mut Clip, playhead: i64, frame_rate: f64) {
        let scrub = self.settings.enable_audio_scrubbing && self.scrubbing && ctx.root_playhead > clip.timeline_in;
        if !ctx.render_audio && !scrub {
            return;
        }
        match clip.media.kind() {
            MediaKind::Sequence => {
                let Some(nested) = clip.media.as_sequence().map(Rc::clone) else {
                    return;
                };
                let Ok(child_rate) = nested.try_borrow().map(|s| s.frame_rate) else {
                    warn!("Cycle detected in compose: '{}' nests a sequence being mixed", clip.name);
                    return;
                };
                ctx.nests.push(NestEntry::new(clip, frame_rate, child_rate));
                self.compose_audio(ctx, &nested);
                ctx.nests.pop();
            }
            MediaKind::Footage => {
                audio::trigger(clip, playhead, ctx.render_audio, &ctx.nests, ctx.speed, &*self.audio);
            }
            MediaKind::Null => {}
        }
    }
}

/// Footage must have finished opening before it can be composed
fn ready_to_compose(clip: &Clip) -> bool {
    if matches!(clip.media, Media::Footage(_)) && !clip.finished_opening() {
        warn!("Tried to display clip '{}' but it's closed", clip.name);
        return false;
    }
    true
}

/// Store animated parameter values of the viewed sequence's clips
fn sync_keyframes(seq: &mut Sequence, playhead: i64) {
    let frame_rate = seq.frame_rate;
    for clip in seq.clips.iter_mut() {
        let time = clip.timecode(playhead, frame_rate);
        for effect in clip.effects.iter_mut() {
            effect.validate_keyframe_data(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AudioCacheRequest, QueuedAudioCache};
    use crate::core::lifecycle::ImmediateLifecycle;
    use crate::core::stills::StillFrameSource;
    use crate::entities::clip::{ClipState, Transition};
    use crate::entities::effects::{BrightnessContrast, CrossDissolve, Effect, Solid, Transform};
    use crate::entities::footage::Footage;
    use crate::entities::frame::Frame;
    use crate::entities::params::{ParamValue, RowAccess};
    use crate::render::cpu::SoftwareContext;
    use crate::render::gpu::{Program, scoped};
    use crossbeam_channel::Receiver;
    use std::cell::Cell;

    struct WakeCounter(Rc<Cell<usize>>);

    impl ViewerHooks for WakeCounter {
        fn play_wake(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn compositor(frames: StillFrameSource) -> (TimelineCompositor, Receiver<AudioCacheRequest>) {
        let (audio, rx) = QueuedAudioCache::channel(true);
        let compositor = TimelineCompositor::new(ComposeSettings::default(), ImmediateLifecycle::new(), frames, audio);
        (compositor, rx)
    }

    fn solid(color: [f32; 4]) -> Effect {
        Effect::new(Solid).with("color", ParamValue::Color(color))
    }

    fn frame(
        comp: &mut TimelineCompositor,
        gpu: &mut SoftwareContext,
        seq: &SharedSequence,
        playhead: i64,
        destination: TargetId,
    ) -> FrameOutcome {
        comp.compose_video_frame(gpu, seq, playhead, destination)
    }

    /// An opening transition runs while progress is inside its length only
    #[test]
    fn test_opening_transition_window() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(
            Clip::new("fade", Media::Null, -1, 0, 100)
                .with_effect(solid([1.0, 1.0, 1.0, 1.0]))
                .with_opening(Transition::opening(CrossDissolve, 10)),
        );
        let seq = seq.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        assert_eq!(seq.borrow().clips[0].opening_progress(5), Some(0.5));
        let out = frame(&mut comp, &mut gpu, &seq, 5, destination);
        let alpha = gpu.pixel(out.texture.unwrap(), 1, 1).unwrap()[3];
        assert!((alpha - 0.5).abs() < 1e-4, "alpha {}", alpha);

        assert_eq!(seq.borrow().clips[0].opening_progress(15), None);
        let out = frame(&mut comp, &mut gpu, &seq, 15, destination);
        let alpha = gpu.pixel(out.texture.unwrap(), 1, 1).unwrap()[3];
        assert!((alpha - 1.0).abs() < 1e-4);
        assert!(!out.needs_redraw);
    }

    /// The wake callback fires once per audio frame with no active audio,
    /// however deep the nesting
    #[test]
    fn test_play_wake_once() {
        let wakes = Rc::new(Cell::new(0));
        let (comp, _rx) = compositor(StillFrameSource::new());
        let mut comp = comp.with_hooks(WakeCounter(Rc::clone(&wakes)));

        let inner = Sequence::new("inner", 4, 4, 30.0).shared();
        let mut root = Sequence::new("root", 4, 4, 30.0);
        root.add_clip(Clip::new("nest", inner.into(), 0, 0, 100));
        root.add_clip(Clip::new("video", Media::Null, -1, 0, 100));
        let root = root.shared();

        let out = comp.compose_audio_frame(&root, 10, true, 1.0);
        assert_eq!(out.audio_active, 0);
        assert_eq!(wakes.get(), 1);

        comp.compose_audio_frame(&root, 11, true, 1.0);
        assert_eq!(wakes.get(), 2);
    }

    /// Active audio footage keeps the clock from being woken
    #[test]
    fn test_audio_request_no_wake() {
        let wakes = Rc::new(Cell::new(0));
        let (comp, rx) = compositor(StillFrameSource::new());
        let mut comp = comp.with_hooks(WakeCounter(Rc::clone(&wakes)));
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(Clip::new("music", Footage::audio("music.wav", 1000).into(), 0, 0, 100));
        let seq = seq.shared();

        let out = comp.compose_audio_frame(&seq, 12, true, 1.0);
        assert_eq!(out.audio_active, 1);
        assert_eq!(wakes.get(), 0);
        let request = rx.try_recv().unwrap();
        assert_eq!(request.playhead, 12);
        assert!(!request.scrub);
    }

    /// A failed generator flags a retry, contributes nothing, and the
    /// other clips still draw
    #[test]
    fn test_failed_superimpose_others_draw() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(
            Clip::new("broken", Media::Null, -2, 0, 100)
                .with_effect(Effect::new(Solid).with("resolution", ParamValue::Vec2([0.0, 0.0]))),
        );
        seq.add_clip(Clip::new("red", Media::Null, -1, 0, 100).with_effect(solid([1.0, 0.0, 0.0, 1.0])));
        let seq = seq.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        let out = frame(&mut comp, &mut gpu, &seq, 3, destination);
        assert!(out.needs_redraw);
        assert_eq!(gpu.pixel(out.texture.unwrap(), 2, 2), Some([1.0, 0.0, 0.0, 1.0]));

        let draws = gpu.take_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].target, destination);
        let generated = seq.borrow().clips[1].effects[0].generated;
        assert_eq!(Some(draws[0].source), generated);
    }

    /// A nested sequence renders into the first target, effects continue in
    /// the second, and the result lands on the destination
    #[test]
    fn test_nested_ping_pong() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(8, 8).unwrap();

        let mut inner = Sequence::new("inner", 8, 8, 30.0);
        inner.add_clip(Clip::new("fill", Media::Null, -1, 0, 100).with_effect(solid([0.2, 0.4, 0.6, 1.0])));
        let inner = inner.shared();

        let mut root = Sequence::new("root", 8, 8, 30.0);
        root.add_clip(
            Clip::new("nest", inner.into(), -1, 0, 100)
                .with_effect(Effect::new(BrightnessContrast).with("brightness", ParamValue::Float(0.1))),
        );
        let root = root.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        frame(&mut comp, &mut gpu, &root, 20, destination);
        let draws = gpu.take_draws();
        let pair = root.borrow().clips[0].targets.clone().unwrap();
        let first = pair.first();

        assert_eq!(draws.len(), 3);
        // inner composite
        assert_eq!(draws[0].target, first.target);
        assert!(matches!(draws[0].program, Some(Program::Blend { .. })));
        // shader pass reads the nested output, writes the other target
        assert_eq!(draws[1].source, first.texture);
        assert!(pair.owns(draws[1].output) && draws[1].output != first.texture);
        assert!(matches!(draws[1].program, Some(Program::Effect(_))));
        // final composite
        assert_eq!(draws[2].target, destination);
        assert_eq!(draws[2].source, draws[1].output);
    }

    /// A sequence nested in itself is skipped without panicking
    #[test]
    fn test_cycle_skipped() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        let seq = Sequence::new("loop", 4, 4, 30.0).shared();
        let clip = Clip::new("self", Media::Sequence(Rc::clone(&seq)), -1, 0, 100);
        seq.borrow_mut().add_clip(clip);
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        let out = frame(&mut comp, &mut gpu, &seq, 5, destination);
        assert!(out.texture.is_some());
        assert!(gpu.draws().is_empty());

        comp.close_all(&seq);
        // Break the Rc cycle
        seq.borrow_mut().clips.clear();
    }

    /// Footage smaller than the sequence is scaled up uniformly unless
    /// autoscale is off
    #[test]
    fn test_autoscale() {
        for (autoscale, corner) in [(true, Some([1.0, 0.0, 0.0, 1.0])), (false, Some([0.0, 0.0, 0.0, 0.0]))] {
            let mut frames = StillFrameSource::new();
            frames.insert("red", vec![Frame::solid(4, 4, [1.0, 0.0, 0.0, 1.0])]);
            let mut gpu = SoftwareContext::new();
            let destination = gpu.create_target(8, 8).unwrap();
            let mut seq = Sequence::new("root", 8, 8, 30.0);
            let footage = Footage::video("red", 4, 4, 30.0, 100);
            seq.add_clip(Clip::new("f", footage.into(), -1, 0, 100).with_autoscale(autoscale));
            let seq = seq.shared();
            let (mut comp, _rx) = compositor(frames);

            let out = frame(&mut comp, &mut gpu, &seq, 0, destination);
            let texture = out.texture.unwrap();
            assert_eq!(gpu.pixel(texture, 0, 0), corner, "autoscale {}", autoscale);
            assert_eq!(gpu.pixel(texture, 4, 4), Some([1.0, 0.0, 0.0, 1.0]));
        }
    }

    /// Leaving a clip closes it; its targets are freed on the next video frame
    #[test]
    fn test_release_after_close() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(Clip::new("short", Media::Null, -1, 0, 5).with_effect(solid([0.0, 1.0, 0.0, 1.0])));
        let seq = seq.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        frame(&mut comp, &mut gpu, &seq, 2, destination);
        assert_eq!(gpu.target_count(), 3);
        assert!(seq.borrow().clips[0].targets.is_some());

        frame(&mut comp, &mut gpu, &seq, 10, destination);
        assert_eq!(seq.borrow().clips[0].state, ClipState::Closed);
        assert!(seq.borrow().clips[0].targets.is_none());
        assert!(comp.pending_release() > 0);

        frame(&mut comp, &mut gpu, &seq, 11, destination);
        assert_eq!(comp.pending_release(), 0);
        assert_eq!(gpu.target_count(), 1);
        assert_eq!(gpu.texture_count(), 1);
    }

    /// Without render_audio, audio goes out only while scrubbing past the
    /// clip's in-point
    #[test]
    fn test_scrub_gating() {
        let (mut comp, rx) = compositor(StillFrameSource::new());
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(Clip::new("a", Footage::audio("a.wav", 1000).into(), 0, 0, 100));
        let seq = seq.shared();

        comp.compose_audio_frame(&seq, 5, false, 1.0);
        assert!(rx.try_recv().is_err());

        comp.set_scrubbing(true);
        comp.compose_audio_frame(&seq, 0, false, 1.0);
        assert!(rx.try_recv().is_err());
        comp.compose_audio_frame(&seq, 5, false, 1.0);
        assert!(rx.try_recv().unwrap().scrub);

        comp.settings_mut().enable_audio_scrubbing = false;
        comp.compose_audio_frame(&seq, 6, false, 1.0);
        assert!(rx.try_recv().is_err());
    }

    /// Audio in a nested sequence is requested at the retimed playhead with
    /// the nest stack attached
    #[test]
    fn test_nested_audio_retimed() {
        let (mut comp, rx) = compositor(StillFrameSource::new());
        let mut inner = Sequence::new("inner", 4, 4, 24.0);
        inner.add_clip(Clip::new("a", Footage::audio("a.wav", 1000).into(), 0, 0, 500));
        let mut root = Sequence::new("root", 4, 4, 30.0);
        root.add_clip(Clip::new("nest", inner.shared().into(), 1, 10, 200));
        let root = root.shared();

        let out = comp.compose_audio_frame(&root, 40, true, 1.0);
        assert_eq!(out.audio_active, 1);
        let request = rx.try_recv().unwrap();
        assert_eq!(request.playhead, 24);
        assert_eq!(request.nests.len(), 1);
        assert_eq!(request.nests[0].parent_rate, 30.0);
        assert_eq!(request.nests[0].child_rate, 24.0);
    }

    /// A selected clip's transform gizmo becomes authoritative at the root
    /// and gets screen positions
    #[test]
    fn test_gizmo_selection() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(100, 100).unwrap();
        let mut seq = Sequence::new("root", 100, 100, 30.0);
        seq.add_clip(
            Clip::new("moved", Media::Null, -1, 0, 100)
                .with_effect(Effect::new(Transform).with("position", ParamValue::Vec2([25.0, 0.0])))
                .with_selected(true),
        );
        let seq = seq.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        let out = frame(&mut comp, &mut gpu, &seq, 1, destination);
        assert!(out.gizmo_changed);
        let effect_id = seq.borrow().clips[0].effects[0].uuid;
        assert_eq!(comp.gizmo().map(|g| g.effect), Some(effect_id));

        let screen = seq.borrow().clips[0].effects[0].gizmos[0].screen;
        assert!((screen.x - 75.0).abs() < 1e-3 && (screen.y - 50.0).abs() < 1e-3);

        let out = frame(&mut comp, &mut gpu, &seq, 2, destination);
        assert!(!out.gizmo_changed);
    }

    /// Animated values of root clips are stored after a frame
    #[test]
    fn test_keyframes_synced() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        let mut effect = Effect::new(Transform);
        effect
            .set_keyframe("opacity", 0.0, ParamValue::Float(0.0))
            .set_keyframe("opacity", 1.0, ParamValue::Float(100.0));
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(Clip::new("anim", Media::Null, -1, 0, 100).with_effect(effect));
        let seq = seq.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        frame(&mut comp, &mut gpu, &seq, 15, destination);
        let value = seq.borrow().clips[0].effects[0].rows.field("opacity").map(|f| f.value.clone());
        assert_eq!(value, Some(ParamValue::Float(50.0)));
    }

    /// Footage still opening is not drawn and asks for a redraw
    #[test]
    fn test_footage_not_open() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        let footage = Footage::video("slow", 4, 4, 30.0, 100);
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        let mut clip = Clip::new("slow", footage.into(), -1, 0, 100);
        clip.state = ClipState::Opening;
        seq.add_clip(clip);
        let seq = seq.shared();

        struct Stuck;
        impl ClipLifecycle for Stuck {
            fn open(&mut self, _clip: &mut Clip, _preview: bool) {}
            fn close(&mut self, clip: &mut Clip, _force: bool) {
                clip.state = ClipState::Closed;
            }
        }
        let (audio, _rx) = QueuedAudioCache::channel(false);
        let mut comp = TimelineCompositor::new(ComposeSettings::default(), Stuck, StillFrameSource::new(), audio);

        let out = frame(&mut comp, &mut gpu, &seq, 3, destination);
        assert!(out.needs_redraw);
        assert!(gpu.draws().is_empty());
    }

    /// The root level draws over the caller's destination without clearing it
    #[test]
    fn test_destination_kept() {
        let mut gpu = SoftwareContext::new();
        let destination = gpu.create_target(4, 4).unwrap();
        scoped(&mut gpu, |gpu| {
            gpu.bind_target(destination);
            gpu.set_viewport(4, 4);
            gpu.clear([0.0, 0.0, 1.0, 1.0]);
        });
        let seq = Sequence::new("empty", 4, 4, 30.0).shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());

        let out = frame(&mut comp, &mut gpu, &seq, 0, destination);
        assert_eq!(gpu.pixel(out.texture.unwrap(), 1, 1), Some([0.0, 0.0, 1.0, 1.0]));
    }

    /// A clip whose targets or upload cannot be allocated is skipped and
    /// the clips above it still draw
    #[test]
    fn test_allocation_failure_others_draw() {
        // destination 1, green pair 2, solid 1, footage pair 2, upload 1
        for limit in [5, 6] {
            let mut frames = StillFrameSource::new();
            frames.insert("red", vec![Frame::solid(4, 4, [1.0, 0.0, 0.0, 1.0])]);
            let mut gpu = SoftwareContext::new().with_texture_limit(limit);
            let destination = gpu.create_target(4, 4).unwrap();
            let mut seq = Sequence::new("root", 4, 4, 30.0);
            seq.add_clip(Clip::new("green", Media::Null, -1, 0, 100).with_effect(solid([0.0, 1.0, 0.0, 1.0])));
            seq.add_clip(Clip::new("red", Footage::video("red", 4, 4, 30.0, 100).into(), -2, 0, 100));
            let seq = seq.shared();
            let (mut comp, _rx) = compositor(frames);

            let out = frame(&mut comp, &mut gpu, &seq, 0, destination);
            assert_eq!(gpu.pixel(out.texture.unwrap(), 2, 2), Some([0.0, 1.0, 0.0, 1.0]), "limit {}", limit);
            assert!(seq.borrow().clips[1].texture.is_none());
        }
    }

    /// A closing dissolve fades the clip out over its last frames
    #[test]
    fn test_closing_transition_window() {
        let mut seq = Sequence::new("root", 4, 4, 30.0);
        seq.add_clip(
            Clip::new("fade", Media::Null, -1, 0, 100)
                .with_effect(solid([1.0, 1.0, 1.0, 1.0]))
                .with_closing(Transition::closing(CrossDissolve, 10)),
        );
        let seq = seq.shared();
        let (mut comp, _rx) = compositor(StillFrameSource::new());
        let mut gpu = SoftwareContext::new();

        for (playhead, expected) in [(89, 1.0), (90, 1.0), (95, 0.5), (99, 0.1), (100, 0.0)] {
            let destination = gpu.create_target(4, 4).unwrap();
            let out = frame(&mut comp, &mut gpu, &seq, playhead, destination);
            let alpha = gpu.pixel(out.texture.unwrap(), 1, 1).unwrap()[3];
            assert!((alpha - expected).abs() < 1e-4, "playhead {} alpha {}", playhead, alpha);
            gpu.delete_target(destination);
        }
    }
}
