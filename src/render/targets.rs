//! Clip-owned render targets and deferred GPU cleanup.
//!
//! A clip renders through two same-sized targets that alternate roles: one
//! holds the working image while the other receives the next pass. Only the
//! active index moves, so each pass reads one texture and writes the other.
//!
//! Clips can be closed from places that have no graphics context (lifecycle
//! calls, drops). Their handles go to a [`ReleaseQueue`] and are freed at the
//! start of the next video frame.

use anyhow::Result;
use log::debug;

use super::gpu::{GraphicsContext, TargetId, TextureId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub target: TargetId,
    pub texture: TextureId,
}

/// Ping-pong pair of offscreen targets
#[derive(Clone, Debug, PartialEq)]
pub struct TargetPair {
    targets: [RenderTarget; 2],
    active: usize,
    size: (u32, u32),
}

impl TargetPair {
    pub fn allocate(gpu: &mut dyn GraphicsContext, width: u32, height: u32) -> Result<Self> {
        let first = Self::allocate_one(gpu, width, height)?;
        let second = match Self::allocate_one(gpu, width, height) {
            Ok(t) => t,
            Err(e) => {
                gpu.delete_target(first.target);
                return Err(e);
            }
        };
        debug!("Allocated target pair {}x{}", width, height);
        Ok(Self {
            targets: [first, second],
            active: 0,
            size: (width, height),
        })
    }

    fn allocate_one(gpu: &mut dyn GraphicsContext, width: u32, height: u32) -> Result<RenderTarget> {
        let target = gpu.create_target(width, height)?;
        match gpu.target_texture(target) {
            Some(texture) => Ok(RenderTarget { target, texture }),
            None => {
                gpu.delete_target(target);
                anyhow::bail!("target {:?} created without a texture", target)
            }
        }
    }

    /// Target the next pass writes into
    pub fn current(&self) -> RenderTarget {
        self.targets[self.active]
    }

    pub fn other(&self) -> RenderTarget {
        self.targets[1 - self.active]
    }

    /// Index 0: nested sequences always render here
    pub fn first(&self) -> RenderTarget {
        self.targets[0]
    }

    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }

    pub fn reset(&mut self) {
        self.active = 0;
    }

    pub fn owns(&self, texture: TextureId) -> bool {
        self.targets.iter().any(|t| t.texture == texture)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// GPU handles waiting for a context to free them
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    textures: Vec<TextureId>,
    targets: Vec<TargetId>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&mut self, texture: TextureId) {
        self.textures.push(texture);
    }

    pub fn pair(&mut self, pair: TargetPair) {
        self.targets.extend(pair.targets.iter().map(|t| t.target));
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.textures.len() + self.targets.len()
    }

    /// Free everything queued so far
    pub fn flush(&mut self, gpu: &mut dyn GraphicsContext) {
        if self.is_empty() {
            return;
        }
        debug!(
            "Releasing {} textures, {} targets",
            self.textures.len(),
            self.targets.len()
        );
        for texture in self.textures.drain(..) {
            gpu.delete_texture(texture);
        }
        for target in self.targets.drain(..) {
            gpu.delete_target(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::cpu::SoftwareContext;

    /// Swap alternates roles, reset returns to the first target
    #[test]
    fn test_pair_roles() {
        let mut gpu = SoftwareContext::new();
        let mut pair = TargetPair::allocate(&mut gpu, 8, 4).unwrap();
        assert_eq!(pair.size(), (8, 4));
        let a = pair.current();
        let b = pair.other();
        assert_ne!(a, b);
        assert_eq!(pair.first(), a);

        pair.swap();
        assert_eq!(pair.current(), b);
        assert_eq!(pair.other(), a);
        assert!(pair.owns(a.texture) && pair.owns(b.texture));

        pair.reset();
        assert_eq!(pair.current(), a);
    }

    /// Flushing the queue frees every queued handle
    #[test]
    fn test_release_queue_flush() {
        let mut gpu = SoftwareContext::new();
        let pair = TargetPair::allocate(&mut gpu, 4, 4).unwrap();
        let tex = gpu.create_texture(&crate::entities::frame::Frame::new(2, 2)).unwrap();
        assert_eq!(gpu.target_count(), 2);

        let mut queue = ReleaseQueue::new();
        queue.pair(pair);
        queue.texture(tex);
        assert_eq!(queue.len(), 3);
        queue.flush(&mut gpu);

        assert!(queue.is_empty());
        assert_eq!(gpu.target_count(), 0);
        assert_eq!(gpu.texture_count(), 0);
    }

    /// A failed second allocation does not leak the first target
    #[test]
    fn test_pair_allocation_failure() {
        let mut gpu = SoftwareContext::new().with_texture_limit(1);
        assert!(TargetPair::allocate(&mut gpu, 4, 4).is_err());
        assert_eq!(gpu.target_count(), 0);
    }
}
