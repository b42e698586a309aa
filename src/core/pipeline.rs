//! Effect pipeline: runs one effect against a clip's working image.
//!
//! The working image is `ClipDraw::texture`. It starts as the decoded
//! footage texture or the nested sequence output and moves between the
//! clip's two targets as passes run:
//!
//! - shader pass: read the working texture, write `current()`, then `swap()`
//! - superimpose: composite generated content into `other()`, no swap
//!
//! Whenever the working texture belongs to the pair it is `other()`, so a
//! pass never writes the buffer it reads.

use anyhow::Result;
use log::{trace, warn};

use crate::entities::effects::{Effect, EffectOps, TransitionArg};
use crate::entities::frame::Frame;
use crate::render::coords::TextureCoords;
use crate::render::gpu::{GraphicsContext, Program, TextureId};
use crate::render::quad::draw_clip;
use crate::render::targets::TargetPair;

/// Working state of one clip draw, threaded through its effect chain
pub struct ClipDraw<'a> {
    pub targets: &'a mut TargetPair,
    pub coords: TextureCoords,
    pub texture: Option<TextureId>,
    /// A pass could not produce its output this frame
    pub retry: bool,
}

impl<'a> ClipDraw<'a> {
    pub fn new(targets: &'a mut TargetPair, coords: TextureCoords, texture: Option<TextureId>) -> Self {
        Self {
            targets,
            coords,
            texture,
            retry: false,
        }
    }
}

/// Upload `frame` into `slot`, reusing the texture already there
pub fn upload_frame(gpu: &mut dyn GraphicsContext, slot: &mut Option<TextureId>, frame: &Frame) -> Result<TextureId> {
    match *slot {
        Some(texture) => {
            gpu.update_texture(texture, frame)?;
            Ok(texture)
        }
        None => {
            let texture = gpu.create_texture(frame)?;
            *slot = Some(texture);
            Ok(texture)
        }
    }
}

/// Apply `effect` at `time` (seconds, or progress for transitions)
pub fn apply_effect(
    gpu: &mut dyn GraphicsContext,
    draw: &mut ClipDraw,
    effect: &mut Effect,
    time: f64,
    arg: TransitionArg,
    shaders_enabled: bool,
) {
    if !effect.enabled {
        return;
    }
    let caps = effect.caps();

    if caps.coords {
        effect.kind.process_coords(&effect.rows, time, &mut draw.coords, arg);
    }

    let run_shader = caps.shader && shaders_enabled;
    if !run_shader && !caps.superimpose {
        return;
    }

    effect.kind.begin(gpu);
    if run_shader {
        shader_pass(gpu, draw, effect, time, arg);
    }
    if caps.superimpose {
        superimpose_pass(gpu, draw, effect, time);
    }
    effect.kind.end(gpu);
}

fn shader_pass(gpu: &mut dyn GraphicsContext, draw: &mut ClipDraw, effect: &Effect, time: f64, arg: TransitionArg) {
    let Some(stage) = effect.kind.shader_stage(&effect.rows, time, arg) else {
        return;
    };
    let Some(source) = draw.texture else {
        trace!("{}: no source texture, skipping shader pass", effect.name());
        return;
    };

    let output = draw.targets.current();
    gpu.use_program(Some(Program::Effect(stage)));
    match draw_clip(gpu, output.target, source, true) {
        Ok(texture) => {
            draw.texture = Some(texture);
            draw.targets.swap();
        }
        Err(e) => warn!("{}: shader pass failed: {}", effect.name(), e),
    }
}

fn superimpose_pass(gpu: &mut dyn GraphicsContext, draw: &mut ClipDraw, effect: &mut Effect, time: f64) {
    let Some(frame) = effect.kind.superimpose(&effect.rows, time, draw.targets.size()) else {
        warn!("{}: superimpose texture was empty, retrying", effect.name());
        draw.retry = true;
        return;
    };
    let generated = match upload_frame(gpu, &mut effect.generated, &frame) {
        Ok(texture) => texture,
        Err(e) => {
            warn!("{}: superimpose upload failed, retrying: {}", effect.name(), e);
            draw.retry = true;
            return;
        }
    };

    let Some(source) = draw.texture else {
        draw.texture = Some(generated);
        return;
    };

    gpu.use_program(None);
    match overlay(gpu, draw.targets, source, generated) {
        Ok(texture) => draw.texture = Some(texture),
        Err(e) => warn!("{}: superimpose draw failed: {}", effect.name(), e),
    }
}

/// Draw `generated` over `source` in `other()`. A source the pair does not
/// own is copied in first.
fn overlay(gpu: &mut dyn GraphicsContext, targets: &TargetPair, source: TextureId, generated: TextureId) -> Result<TextureId> {
    let output = targets.other();
    if !targets.owns(source) {
        draw_clip(gpu, output.target, source, true)?;
    }
    draw_clip(gpu, output.target, generated, false)
}
