//! Sequence: clips on tracks plus the timebase they are drawn in.
//!
//! Clip order is the input order for stacking, not time order. Sequences are
//! nested by reference (`SharedSequence`); the editing layer keeps that graph
//! acyclic.

use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

use super::clip::{Clip, ClipId};

pub type SharedSequence = Rc<RefCell<Sequence>>;

#[derive(Debug)]
pub struct Sequence {
    pub uuid: Uuid,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Current position in frames, advanced by the playback driver
    pub playhead: i64,
    pub clips: Vec<Clip>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            width,
            height,
            frame_rate,
            playhead: 0,
            clips: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedSequence {
        Rc::new(RefCell::new(self))
    }

    pub fn add_clip(&mut self, clip: Clip) -> ClipId {
        let id = clip.id;
        self.clips.push(clip);
        id
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    /// End of the last clip, in frames
    pub fn length(&self) -> i64 {
        self.clips
            .iter()
            .map(|c| c.timeline_out_with_transition())
            .max()
            .unwrap_or(0)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::media::Media;

    /// Length follows the furthest clip end
    #[test]
    fn test_length_and_lookup() {
        let mut seq = Sequence::new("main", 640, 360, 30.0);
        assert_eq!(seq.length(), 0);
        let a = seq.add_clip(Clip::new("a", Media::Null, -1, 0, 50));
        seq.add_clip(Clip::new("b", Media::Null, -2, 20, 90));
        assert_eq!(seq.length(), 90);
        assert_eq!(seq.clip(a).map(|c| c.name.as_str()), Some("a"));
    }
}
