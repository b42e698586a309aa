//! Synchronous clip lifecycle.
//!
//! Media here is already decodable when a clip is opened, so opening moves
//! straight to `Open`.

use log::debug;

use crate::entities::clip::{Clip, ClipState};

use super::traits::ClipLifecycle;

#[derive(Debug, Default)]
pub struct ImmediateLifecycle {
    /// Open calls that changed state
    pub opened: usize,
    /// Close calls that changed state
    pub closed: usize,
}

impl ImmediateLifecycle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipLifecycle for ImmediateLifecycle {
    fn open(&mut self, clip: &mut Clip, preview: bool) {
        if clip.state == ClipState::Open {
            return;
        }
        debug!("Open clip '{}' (preview={})", clip.name, preview);
        clip.state = ClipState::Open;
        self.opened += 1;
    }

    fn close(&mut self, clip: &mut Clip, force: bool) {
        if clip.state == ClipState::Closed {
            return;
        }
        debug!("Close clip '{}' (force={})", clip.name, force);
        clip.state = ClipState::Closed;
        self.closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::media::Media;

    /// Repeated open/close calls are no-ops
    #[test]
    fn test_idempotent() {
        let mut lifecycle = ImmediateLifecycle::new();
        let mut clip = Clip::new("a", Media::Null, -1, 0, 10);

        lifecycle.open(&mut clip, true);
        lifecycle.open(&mut clip, true);
        assert_eq!(clip.state, ClipState::Open);
        assert_eq!(lifecycle.opened, 1);

        lifecycle.close(&mut clip, false);
        lifecycle.close(&mut clip, true);
        assert_eq!(clip.state, ClipState::Closed);
        assert_eq!(lifecycle.closed, 1);
    }

    /// A closed clip opens again on the next request
    #[test]
    fn test_reopen_after_close() {
        let mut lifecycle = ImmediateLifecycle::new();
        let mut clip = Clip::new("a", Media::Null, -1, 0, 10);

        lifecycle.open(&mut clip, false);
        lifecycle.close(&mut clip, true);
        lifecycle.open(&mut clip, false);
        assert!(clip.finished_opening());
        assert_eq!(lifecycle.opened, 2);
        assert_eq!(lifecycle.closed, 1);
    }
}
