//! Float frames exchanged with the kernel

use crate::error::KernelError;
use crate::texture::PixelBuffer;

const RGB: usize = 3;
const RGBA: usize = 4;

/// Planar RGB image with channel values in `[0, 1]`
///
/// Layout is channel-major: all red values, then all green, then all blue.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Frame {
    /// Black frame of the given size
    pub fn new(width: u32, height: u32) -> Result<Self, KernelError> {
        Ok(Self {
            width,
            height,
            data: vec![0.0; Self::value_count(width, height)?],
        })
    }

    /// Wrap planar RGB data
    pub fn from_planar(width: u32, height: u32, data: Vec<f32>) -> Result<Self, KernelError> {
        let expected = Self::value_count(width, height)?;
        if data.len() != expected {
            return Err(KernelError::InvalidInput(format!(
                "expected {} planar values for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn value_count(width: u32, height: u32) -> Result<usize, KernelError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|plane| plane.checked_mul(RGB))
            .ok_or_else(|| {
                KernelError::InvalidInput(format!("{}x{} frame is too large", width, height))
            })
    }

    fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Refill from an RGBA8 buffer: alpha stripped, values scaled to `[0, 1]`
    ///
    /// Reuses the existing allocation when the size is unchanged.
    pub fn load_rgba(&mut self, pixels: &PixelBuffer) {
        self.width = pixels.width();
        self.height = pixels.height();
        let plane = self.plane_len();
        self.data.resize(plane * RGB, 0.0);

        for (i, px) in pixels.as_bytes().chunks_exact(RGBA).enumerate() {
            for c in 0..RGB {
                self.data[c * plane + i] = f32::from(px[c]) / 255.0;
            }
        }
    }

    /// Write into the RGB channels of an RGBA8 buffer, leaving alpha as is
    pub fn store_rgb(&self, pixels: &mut PixelBuffer) -> Result<(), KernelError> {
        if (pixels.width(), pixels.height()) != (self.width, self.height) {
            return Err(KernelError::InvalidInput(format!(
                "kernel produced {}x{} frame for {}x{} output",
                self.width,
                self.height,
                pixels.width(),
                pixels.height()
            )));
        }

        let plane = self.plane_len();
        for (i, px) in pixels.as_bytes_mut().chunks_exact_mut(RGBA).enumerate() {
            for c in 0..RGB {
                let value = self.data[c * plane + i].clamp(0.0, 1.0);
                px[c] = (value * 255.0).round() as u8;
            }
        }
        Ok(())
    }
}
