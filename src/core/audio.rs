//! Audio cache triggering.
//!
//! The compositor never touches samples. For every active audio clip it
//! issues a request describing where the playhead is, through every level
//! of nesting, and leaves the work to a background cache.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{trace, warn};
use std::sync::{Arc, TryLockError};

use crate::entities::clip::{Clip, ClipId};
use crate::entities::footage::Footage;

use super::retime::NestEntry;
use super::traits::AudioCache;

/// One cache request, captured by value so it can cross threads
#[derive(Clone, Debug)]
pub struct AudioCacheRequest {
    pub clip: ClipId,
    pub footage: Option<Arc<Footage>>,
    /// Playhead in the clip's own sequence
    pub playhead: i64,
    /// Discard what is buffered and start fresh
    pub reset: bool,
    /// Short scrub burst instead of continuous rendering
    pub scrub: bool,
    /// Nest stack from the root sequence down to the clip's sequence
    pub nests: Vec<NestEntry>,
    pub speed: f64,
}

/// Issue a cache request for `clip` unless its cache lock is held.
///
/// Returns true if a request went out.
pub fn trigger(
    clip: &mut Clip,
    playhead: i64,
    render_audio: bool,
    nests: &[NestEntry],
    speed: f64,
    cache: &dyn AudioCache,
) -> bool {
    let lock = Arc::clone(&clip.cache_lock);
    let _guard = match lock.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::WouldBlock) => {
            trace!("Audio cache busy for '{}', skipping", clip.name);
            return false;
        }
        Err(TryLockError::Poisoned(poisoned)) => {
            warn!("Audio cache lock for '{}' was poisoned", clip.name);
            poisoned.into_inner()
        }
    };

    let request = AudioCacheRequest {
        clip: clip.id,
        footage: clip.media.as_footage().cloned(),
        playhead,
        reset: clip.audio_reset,
        scrub: !render_audio,
        nests: nests.to_vec(),
        speed,
    };
    trace!(
        "Audio request '{}' at {} reset={} scrub={} depth={}",
        clip.name,
        playhead,
        request.reset,
        request.scrub,
        nests.len()
    );
    cache.cache(request);
    clip.audio_reset = false;
    true
}

/// Audio cache front end that forwards requests to a worker over a channel
#[derive(Debug, Clone)]
pub struct QueuedAudioCache {
    tx: Sender<AudioCacheRequest>,
    device: bool,
}

impl QueuedAudioCache {
    /// Create the cache and the receiving end for the worker
    pub fn channel(device: bool) -> (Self, Receiver<AudioCacheRequest>) {
        let (tx, rx) = unbounded();
        (Self { tx, device }, rx)
    }
}

impl AudioCache for QueuedAudioCache {
    fn device_available(&self) -> bool {
        self.device
    }

    fn cache(&self, request: AudioCacheRequest) {
        if let Err(e) = self.tx.send(request) {
            warn!("Audio cache worker gone, dropping request for {}", e.0.clip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::media::Media;

    fn audio_clip() -> Clip {
        Clip::new("a", Footage::audio("a.wav", 100).into(), 0, 0, 100)
    }

    /// A held cache lock skips the request without blocking
    #[test]
    fn test_busy_lock_skipped() {
        let (cache, rx) = QueuedAudioCache::channel(true);
        let mut clip = audio_clip();
        let lock = Arc::clone(&clip.cache_lock);
        let held = lock.lock().unwrap();

        assert!(!trigger(&mut clip, 5, true, &[], 1.0, &cache));
        assert!(rx.try_recv().is_err());

        drop(held);
        assert!(trigger(&mut clip, 5, true, &[], 1.0, &cache));
        assert_eq!(rx.try_recv().unwrap().playhead, 5);
    }

    /// The reset flag goes out once and is then cleared
    #[test]
    fn test_reset_consumed() {
        let (cache, rx) = QueuedAudioCache::channel(true);
        let mut clip = audio_clip();
        clip.audio_reset = true;

        trigger(&mut clip, 1, false, &[], 1.0, &cache);
        trigger(&mut clip, 2, false, &[], 1.0, &cache);
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(first.reset && first.scrub);
        assert!(!second.reset);
        assert!(!clip.audio_reset);
    }

    /// Requests carry the nest stack and footage to the worker thread
    #[test]
    fn test_channel_delivery() {
        let (cache, rx) = QueuedAudioCache::channel(true);
        let nest = NestEntry::new(&Clip::new("n", Media::Null, -1, 10, 50), 30.0, 24.0);
        let mut clip = audio_clip();

        let worker = std::thread::spawn(move || rx.recv().unwrap());
        assert!(trigger(&mut clip, 7, true, std::slice::from_ref(&nest), 2.0, &cache));
        let request = worker.join().unwrap();

        assert_eq!(request.clip, clip.id);
        assert_eq!(request.nests, vec![nest]);
        assert_eq!(request.speed, 2.0);
        assert!(!request.scrub);
        assert_eq!(request.footage.map(|f| f.name.clone()), Some("a.wav".to_string()));
    }
}
