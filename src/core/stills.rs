//! In-memory frame source keyed by footage name.
//!
//! Frames are held decoded; a clip's frame index is its clip-local frame,
//! clamped to the frames available (a single still holds for the whole clip).

use anyhow::Result;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;

use crate::entities::clip::Clip;
use crate::entities::frame::Frame;
use crate::entities::loader::Loader;

use super::traits::{FrameFetch, FrameSource};

#[derive(Debug, Default)]
pub struct StillFrameSource {
    frames: HashMap<String, Vec<Frame>>,
}

impl StillFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, frames: Vec<Frame>) {
        self.frames.insert(name.into(), frames);
    }

    /// Load image files in order as the frames for `name`
    pub fn load<P: AsRef<Path>>(&mut self, name: impl Into<String>, paths: &[P]) -> Result<usize> {
        let frames = paths
            .iter()
            .map(|p| Loader::load(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let name = name.into();
        debug!("Loaded {} frames for '{}'", frames.len(), name);
        let count = frames.len();
        self.frames.insert(name, frames);
        Ok(count)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.contains_key(name)
    }
}

impl FrameSource for StillFrameSource {
    fn frame_at(&self, clip: &Clip, playhead: i64) -> FrameFetch {
        let Some(footage) = clip.media.as_footage() else {
            return FrameFetch::Pending;
        };
        let Some(frames) = self.frames.get(&footage.name).filter(|f| !f.is_empty()) else {
            warn!("No frames for footage '{}'", footage.name);
            return FrameFetch::Pending;
        };
        let local = playhead - clip.timeline_in + clip.clip_in;
        let index = local.clamp(0, frames.len() as i64 - 1) as usize;
        FrameFetch::Ready(frames[index].clone())
    }
}
