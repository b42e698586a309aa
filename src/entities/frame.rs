//! Decoded frame with multi-format pixel buffers (U8, F16, F32)
//!
//! Decoders hand frames to the compositor in whatever precision they produce:
//! - PNG/JPEG: 8-bit RGBA (u8)
//! - EXR HALF: 16-bit float (half::f16)
//! - EXR FLOAT / generated content: 32-bit float (f32)
//!
//! All buffers are straight (non-premultiplied) RGBA, row 0 at the top.
//! Graphics backends convert to their own storage on upload.

use half::f16 as F16;

/// Pixel buffer format - stores different precision levels
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),   // LDR formats (PNG, JPEG, TGA) - 8-bit per channel
    F16(Vec<F16>), // HDR half-precision (EXR HALF) - 16-bit float per channel
    F32(Vec<f32>), // HDR full-precision - 32-bit float per channel
}

/// Pixel format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    RgbaF16,
    RgbaF32,
}

/// Single RGBA frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    buffer: PixelBuffer,
    width: usize,
    height: usize,
}

impl Frame {
    /// Create a fully transparent F32 frame
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            buffer: PixelBuffer::F32(vec![0.0; width * height * 4]),
            width,
            height,
        }
    }

    /// Create a frame filled with one straight-alpha color
    pub fn solid(width: usize, height: usize, color: [f32; 4]) -> Self {
        let mut data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self {
            buffer: PixelBuffer::F32(data),
            width,
            height,
        }
    }

    /// Wrap an existing buffer. Caller guarantees `width * height * 4` elements.
    pub fn from_buffer(buffer: PixelBuffer, width: usize, height: usize) -> Self {
        debug_assert_eq!(buffer_len(&buffer), width * height * 4);
        Self { buffer, width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self.buffer {
            PixelBuffer::U8(_) => PixelFormat::Rgba8,
            PixelBuffer::F16(_) => PixelFormat::RgbaF16,
            PixelBuffer::F32(_) => PixelFormat::RgbaF32,
        }
    }

    /// Straight RGBA as f32 in 0..1 (HDR values pass through)
    pub fn to_rgba_f32(&self) -> Vec<f32> {
        match &self.buffer {
            PixelBuffer::U8(data) => data.iter().map(|&v| v as f32 / 255.0).collect(),
            PixelBuffer::F16(data) => data.iter().map(|v| v.to_f32()).collect(),
            PixelBuffer::F32(data) => data.clone(),
        }
    }

    /// 8-bit RGBA, clamped
    pub fn to_rgba8(&self) -> Vec<u8> {
        match &self.buffer {
            PixelBuffer::U8(data) => data.clone(),
            PixelBuffer::F16(data) => data.iter().map(|v| to_u8(v.to_f32())).collect(),
            PixelBuffer::F32(data) => data.iter().map(|&v| to_u8(v)).collect(),
        }
    }

    /// Read one pixel as straight f32 RGBA
    pub fn pixel(&self, x: usize, y: usize) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some(match &self.buffer {
            PixelBuffer::U8(d) => [
                d[i] as f32 / 255.0,
                d[i + 1] as f32 / 255.0,
                d[i + 2] as f32 / 255.0,
                d[i + 3] as f32 / 255.0,
            ],
            PixelBuffer::F16(d) => [d[i].to_f32(), d[i + 1].to_f32(), d[i + 2].to_f32(), d[i + 3].to_f32()],
            PixelBuffer::F32(d) => [d[i], d[i + 1], d[i + 2], d[i + 3]],
        })
    }
}

fn buffer_len(buffer: &PixelBuffer) -> usize {
    match buffer {
        PixelBuffer::U8(d) => d.len(),
        PixelBuffer::F16(d) => d.len(),
        PixelBuffer::F32(d) => d.len(),
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid frames report the fill color at every pixel
    #[test]
    fn test_solid_pixel() {
        let frame = Frame::solid(3, 2, [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(frame.resolution(), (3, 2));
        assert_eq!(frame.pixel(2, 1), Some([1.0, 0.5, 0.0, 1.0]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    /// F16 and U8 conversions agree on simple values
    #[test]
    fn test_format_conversion() {
        let half = Frame::from_buffer(
            PixelBuffer::F16(vec![F16::from_f32(1.0), F16::from_f32(0.0), F16::from_f32(0.5), F16::from_f32(1.0)]),
            1,
            1,
        );
        assert_eq!(half.pixel_format(), PixelFormat::RgbaF16);
        assert_eq!(half.to_rgba8(), vec![255, 0, 128, 255]);

        let ldr = Frame::from_buffer(PixelBuffer::U8(vec![255, 0, 0, 255]), 1, 1);
        assert_eq!(ldr.to_rgba_f32(), vec![1.0, 0.0, 0.0, 1.0]);
    }
}
