//! Still image loading and saving through the `image` crate.
//!
//! LDR files stay 8-bit, EXR and HDR files are decoded to f32 so the
//! compositor can keep their range.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use super::frame::{Frame, PixelBuffer};

/// Image loader
pub struct Loader;

impl Loader {
    /// Load image file into Frame
    pub fn load(path: &Path) -> Result<Frame> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        debug!("Loading image: {}", path.display());

        let img = image::open(path).with_context(|| format!("Failed to load image: {}", path.display()))?;
        let width = img.width() as usize;
        let height = img.height() as usize;

        let buffer = match ext.as_str() {
            "exr" | "hdr" => PixelBuffer::F32(img.to_rgba32f().into_raw()),
            _ => PixelBuffer::U8(img.to_rgba8().into_raw()),
        };

        Ok(Frame::from_buffer(buffer, width, height))
    }

    /// Save frame as 8-bit PNG (format picked from extension by `image`)
    pub fn save(frame: &Frame, path: &Path) -> Result<()> {
        let img = image::RgbaImage::from_raw(frame.width() as u32, frame.height() as u32, frame.to_rgba8())
            .context("Frame buffer does not match its dimensions")?;
        img.save(path)
            .with_context(|| format!("Failed to save image: {}", path.display()))?;
        debug!("Saved {}x{} frame to {}", frame.width(), frame.height(), path.display());
        Ok(())
    }
}
