//! RGBA8 pixel buffers

use crate::error::TextureError;

/// Bytes per RGBA8 pixel
pub const CHANNELS: usize = 4;

/// Largest width or height a texture may have
pub const MAX_TEXTURE_DIMENSION: u32 = 4096;

/// Host-side RGBA8 pixel buffer, row-major, tightly packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Zero-filled buffer (transparent black)
    pub fn new(width: u32, height: u32) -> Result<Self, TextureError> {
        Self::filled(width, height, 0)
    }

    /// Buffer filled with 255 in every channel (opaque white)
    pub fn opaque(width: u32, height: u32) -> Result<Self, TextureError> {
        Self::filled(width, height, u8::MAX)
    }

    fn filled(width: u32, height: u32, value: u8) -> Result<Self, TextureError> {
        Ok(Self {
            width,
            height,
            data: vec![value; Self::byte_len(width, height)?],
        })
    }

    /// Wrap existing RGBA bytes
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, TextureError> {
        let expected = Self::byte_len(width, height)?;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Number of bytes a `width` x `height` RGBA8 image occupies
    pub fn byte_len(width: u32, height: u32) -> Result<usize, TextureError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .ok_or_else(|| {
                TextureError::Allocation(format!("{}x{} exceeds addressable memory", width, height))
            })
    }

    /// Reject sizes a texture cannot have
    pub fn check_dimensions(width: u32, height: u32) -> Result<(), TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::Allocation(format!(
                "cannot allocate {}x{} texture",
                width, height
            )));
        }
        if width > MAX_TEXTURE_DIMENSION || height > MAX_TEXTURE_DIMENSION {
            return Err(TextureError::Allocation(format!(
                "{}x{} exceeds the {} pixel texture limit",
                width, height, MAX_TEXTURE_DIMENSION
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Nearest-neighbour scale into `dst`, whatever its size
    pub fn resample_into(&self, dst: &mut PixelBuffer) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (src_w, src_h) = (self.width as usize, self.height as usize);
        let (dst_w, dst_h) = (dst.width as usize, dst.height as usize);

        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            for x in 0..dst_w {
                let sx = x * src_w / dst_w;
                let from = (sy * src_w + sx) * CHANNELS;
                let to = (y * dst_w + x) * CHANNELS;
                dst.data[to..to + CHANNELS].copy_from_slice(&self.data[from..from + CHANNELS]);
            }
        }
    }
}
