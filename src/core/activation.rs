//! Clip activation: which clips of a sequence take part in this frame.
//!
//! Scans the clip list once per pass, opening clips that became active
//! and closing (without force) clips that stopped being active. Closed
//! clips hand their GPU handles to the release queue.

use log::{debug, trace};

use crate::entities::clip::Clip;
use crate::entities::media::Media;
use crate::entities::sequence::Sequence;
use crate::render::targets::ReleaseQueue;

use super::traits::ClipLifecycle;

/// Track polarity processed by one compose call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    Video,
    Audio,
}

impl Pass {
    pub fn matches(self, clip: &Clip) -> bool {
        clip.is_video() == (self == Pass::Video)
    }
}

/// Collaborators the resolver drives
pub struct ResolveEnv<'a> {
    pub lifecycle: &'a mut dyn ClipLifecycle,
    pub audio_device: bool,
    /// Open clips at preview quality
    pub preview: bool,
    pub release: &'a mut ReleaseQueue,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Indices into `Sequence::clips`, in draw order
    pub clips: Vec<usize>,
    /// Active audio footage clips
    pub audio_active: usize,
    /// Some footage was not ready; redraw later
    pub retry: bool,
}

enum Gate {
    Active,
    Inactive,
    /// Neither open nor close
    Skip,
}

fn gate(clip: &Clip, playhead: i64, audio_device: bool, retry: &mut bool) -> Gate {
    match &clip.media {
        Media::Footage(footage) => {
            if footage.invalid || (!clip.is_video() && !audio_device) {
                return Gate::Skip;
            }
            if !footage.is_ready() {
                trace!("Footage '{}' not ready, retrying", footage.name);
                *retry = true;
                return Gate::Skip;
            }
            let has_stream = footage.stream_for_index(clip.is_video(), clip.media_stream).is_some();
            if has_stream && clip.is_active_at(playhead) {
                Gate::Active
            } else {
                Gate::Inactive
            }
        }
        Media::Sequence(_) | Media::Null => {
            if clip.is_active_at(playhead) {
                Gate::Active
            } else {
                Gate::Inactive
            }
        }
    }
}

/// Insert before the first entry with a smaller track; equal tracks keep
/// input order
pub fn insert_by_track(list: &mut Vec<(usize, i32)>, entry: (usize, i32)) {
    match list.iter().position(|&(_, track)| track < entry.1) {
        Some(i) => list.insert(i, entry),
        None => list.push(entry),
    }
}

/// Resolve active clips of `seq` at `playhead` for `pass`
pub fn resolve(seq: &mut Sequence, playhead: i64, pass: Pass, env: &mut ResolveEnv) -> Activation {
    let mut retry = false;
    let mut audio_active = 0;
    let mut ordered: Vec<(usize, i32)> = Vec::new();

    for (index, clip) in seq.clips.iter_mut().enumerate() {
        if !pass.matches(clip) {
            continue;
        }
        match gate(clip, playhead, env.audio_device, &mut retry) {
            Gate::Active => {
                if !clip.is_open() {
                    env.lifecycle.open(clip, env.preview);
                }
                if !clip.is_video() && matches!(clip.media, Media::Footage(_)) {
                    audio_active += 1;
                }
                match pass {
                    Pass::Video => insert_by_track(&mut ordered, (index, clip.track)),
                    Pass::Audio => ordered.push((index, clip.track)),
                }
            }
            Gate::Inactive => {
                if clip.is_open() {
                    debug!("Clip '{}' inactive at {}, closing", clip.name, playhead);
                    env.lifecycle.close(clip, false);
                    clip.release_gpu(env.release);
                }
            }
            Gate::Skip => {}
        }
    }

    Activation {
        clips: ordered.into_iter().map(|(index, _)| index).collect(),
        audio_active,
        retry,
    }
}
