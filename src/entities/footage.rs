//! Footage: an imported media file and its decodable streams.
//!
//! Probing and decoding live outside the compositor. Footage only exposes the
//! facts the compositor gates on: `invalid` (probe failed for good), `ready`
//! (decode pipeline can serve frames) and the stream table.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// One decodable stream inside a media file
#[derive(Debug, Clone, PartialEq)]
pub struct FootageStream {
    /// Stream index inside the file
    pub file_index: usize,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Length in frames at `frame_rate`
    pub len: i64,
}

#[derive(Debug)]
pub struct Footage {
    pub name: String,
    pub path: Option<PathBuf>,
    pub invalid: bool,
    ready: AtomicBool,
    pub video_streams: Vec<FootageStream>,
    pub audio_streams: Vec<FootageStream>,
}

impl Footage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            invalid: false,
            ready: AtomicBool::new(false),
            video_streams: Vec::new(),
            audio_streams: Vec::new(),
        }
    }

    /// Single video stream footage, ready to decode
    pub fn video(name: impl Into<String>, width: u32, height: u32, frame_rate: f64, len: i64) -> Self {
        let footage = Self::new(name).with_video_stream(FootageStream {
            file_index: 0,
            width,
            height,
            frame_rate,
            len,
        });
        footage.set_ready(true);
        footage
    }

    /// Single audio stream footage, ready to decode
    pub fn audio(name: impl Into<String>, len: i64) -> Self {
        let footage = Self::new(name).with_audio_stream(FootageStream {
            file_index: 0,
            width: 0,
            height: 0,
            frame_rate: 0.0,
            len,
        });
        footage.set_ready(true);
        footage
    }

    pub fn with_video_stream(mut self, stream: FootageStream) -> Self {
        self.video_streams.push(stream);
        self
    }

    pub fn with_audio_stream(mut self, stream: FootageStream) -> Self {
        self.audio_streams.push(stream);
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn mark_invalid(mut self) -> Self {
        self.invalid = true;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Set by the decode side once the pipeline can serve frames
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn stream_for_index(&self, is_video: bool, index: usize) -> Option<&FootageStream> {
        let streams = if is_video { &self.video_streams } else { &self.audio_streams };
        streams.iter().find(|s| s.file_index == index)
    }
}
