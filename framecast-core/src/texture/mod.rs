//! Interprocess shared-texture capability
//!
//! A [`SharedTexture`] is a GPU-resident buffer addressed by an opaque
//! [`TextureHandle`]. Textures are either *exported* (created here, handle
//! handed to the peer) or *imported* (opened from a handle the peer gave us).
//! Pixel data may only be moved while holding a [`TextureAccess`] guard,
//! which releases the texture when dropped.

mod memory;
mod pixels;

pub use memory::{AccessKind, AccessRecord, MemoryTextureProvider};
pub use pixels::{MAX_TEXTURE_DIMENSION, PixelBuffer};

use crate::error::TextureError;

/// Opaque interprocess texture handle
pub type TextureHandle = u64;

/// A shared texture, exported or imported
///
/// `read_into` and `write_from` are only valid between `lock` and `unlock`;
/// callers go through [`TextureAccess`] rather than calling them directly.
pub trait SharedTexture: Send {
    /// Handle that identifies this texture across processes
    fn handle(&self) -> TextureHandle;

    /// Width and height in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Acquire exclusive access; fails with [`TextureError::Busy`] if held
    fn lock(&mut self) -> Result<(), TextureError>;

    /// Release exclusive access
    fn unlock(&mut self);

    /// Copy the texture contents into `dst`
    fn read_into(&mut self, dst: &mut PixelBuffer) -> Result<(), TextureError>;

    /// Overwrite the texture contents with `src`
    fn write_from(&mut self, src: &PixelBuffer) -> Result<(), TextureError>;
}

/// Creates and opens shared textures
pub trait TextureProvider: Send + Sync {
    /// Allocate and export a new texture
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn SharedTexture>, TextureError>;

    /// Import a texture exported by another party
    fn open(&self, handle: TextureHandle) -> Result<Box<dyn SharedTexture>, TextureError>;
}

/// Scoped exclusive access to a texture
///
/// Created by [`TextureAccess::acquire`]; the lock is released on drop, so
/// early returns and `?` cannot leak it.
pub struct TextureAccess<'a> {
    texture: &'a mut dyn SharedTexture,
}

impl<'a> TextureAccess<'a> {
    /// Lock `texture` for the lifetime of the returned guard
    pub fn acquire(texture: &'a mut dyn SharedTexture) -> Result<Self, TextureError> {
        texture.lock()?;
        Ok(Self { texture })
    }

    /// Copy the texture into `dst`
    pub fn copy_out(&mut self, dst: &mut PixelBuffer) -> Result<(), TextureError> {
        self.texture.read_into(dst)
    }

    /// Copy `src` into the texture
    pub fn copy_in(&mut self, src: &PixelBuffer) -> Result<(), TextureError> {
        self.texture.write_from(src)
    }
}

impl Drop for TextureAccess<'_> {
    fn drop(&mut self) {
        self.texture.unlock();
    }
}
