//! In-process shared-texture backend
//!
//! MemoryTextureProvider keeps a handle table of host-memory surfaces. Any
//! holder of a handle can open the surface, and the exclusive-access lock is
//! tracked per surface, so two openers of the same handle contend the way two
//! processes sharing a GPU texture would. Exported textures leave the table
//! when dropped.
//!
//! Lock and unlock operations can be recorded in an access log to check that
//! access windows on a texture never overlap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use super::pixels::PixelBuffer;
use super::{SharedTexture, TextureHandle, TextureProvider};
use crate::error::TextureError;

/// Kind of access event in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Lock,
    Unlock,
}

/// One recorded lock or unlock, in global order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub handle: TextureHandle,
    pub kind: AccessKind,
}

struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
    locked: bool,
}

type SurfaceRef = Arc<Mutex<Surface>>;

struct Table {
    surfaces: Mutex<HashMap<TextureHandle, SurfaceRef>>,
    log: Option<Mutex<Vec<AccessRecord>>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Table {
    fn record(&self, handle: TextureHandle, kind: AccessKind) {
        if let Some(log) = &self.log {
            guard(log).push(AccessRecord { handle, kind });
        }
    }
}

/// Host-memory [`TextureProvider`] with a shared handle table
pub struct MemoryTextureProvider {
    table: Arc<Table>,
    next_handle: AtomicU64,
}

impl MemoryTextureProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a provider that records every lock and unlock
    pub fn with_access_log() -> Self {
        Self::build(Some(Mutex::new(Vec::new())))
    }

    fn build(log: Option<Mutex<Vec<AccessRecord>>>) -> Self {
        Self {
            table: Arc::new(Table {
                surfaces: Mutex::new(HashMap::new()),
                log,
            }),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Number of exported textures still alive
    pub fn live_textures(&self) -> usize {
        guard(&self.table.surfaces).len()
    }

    /// Copy of a texture's current contents
    pub fn snapshot(&self, handle: TextureHandle) -> Option<PixelBuffer> {
        let surface = guard(&self.table.surfaces).get(&handle).cloned()?;
        let surface = guard(&surface);
        PixelBuffer::from_rgba(surface.width, surface.height, surface.data.clone()).ok()
    }

    /// Overwrite a texture's contents without taking the access lock
    ///
    /// Stands in for the remote process drawing into its own texture.
    pub fn fill(&self, handle: TextureHandle, pixels: &PixelBuffer) -> Result<(), TextureError> {
        let surface = guard(&self.table.surfaces)
            .get(&handle)
            .cloned()
            .ok_or(TextureError::UnknownHandle(handle))?;
        let mut surface = guard(&surface);
        if surface.data.len() != pixels.as_bytes().len() {
            return Err(TextureError::SizeMismatch {
                expected: surface.data.len(),
                actual: pixels.as_bytes().len(),
            });
        }
        surface.data.copy_from_slice(pixels.as_bytes());
        Ok(())
    }

    /// All access events recorded so far (empty without an access log)
    pub fn access_log(&self) -> Vec<AccessRecord> {
        match &self.table.log {
            Some(log) => guard(log).clone(),
            None => Vec::new(),
        }
    }
}

impl Default for MemoryTextureProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureProvider for MemoryTextureProvider {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn SharedTexture>, TextureError> {
        PixelBuffer::check_dimensions(width, height)?;
        let data = vec![u8::MAX; PixelBuffer::byte_len(width, height)?];

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let surface = Arc::new(Mutex::new(Surface {
            width,
            height,
            data,
            locked: false,
        }));
        guard(&self.table.surfaces).insert(handle, Arc::clone(&surface));

        debug!(handle, width, height, "Exported memory texture");
        Ok(Box::new(MemoryTexture {
            handle,
            width,
            height,
            surface,
            table: Arc::downgrade(&self.table),
            exported: true,
            holds_lock: false,
        }))
    }

    fn open(&self, handle: TextureHandle) -> Result<Box<dyn SharedTexture>, TextureError> {
        let surface = guard(&self.table.surfaces)
            .get(&handle)
            .cloned()
            .ok_or(TextureError::UnknownHandle(handle))?;
        let (width, height) = {
            let surface = guard(&surface);
            (surface.width, surface.height)
        };

        debug!(handle, width, height, "Imported memory texture");
        Ok(Box::new(MemoryTexture {
            handle,
            width,
            height,
            surface,
            table: Arc::downgrade(&self.table),
            exported: false,
            holds_lock: false,
        }))
    }
}

struct MemoryTexture {
    handle: TextureHandle,
    width: u32,
    height: u32,
    surface: SurfaceRef,
    table: Weak<Table>,
    exported: bool,
    holds_lock: bool,
}

impl MemoryTexture {
    fn check_len(expected: usize, actual: usize) -> Result<(), TextureError> {
        if expected == actual {
            Ok(())
        } else {
            Err(TextureError::SizeMismatch { expected, actual })
        }
    }
}

impl SharedTexture for MemoryTexture {
    fn handle(&self) -> TextureHandle {
        self.handle
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn lock(&mut self) -> Result<(), TextureError> {
        let mut surface = guard(&self.surface);
        if surface.locked {
            return Err(TextureError::Busy(self.handle));
        }
        surface.locked = true;
        self.holds_lock = true;
        if let Some(table) = self.table.upgrade() {
            table.record(self.handle, AccessKind::Lock);
        }
        Ok(())
    }

    fn unlock(&mut self) {
        if !self.holds_lock {
            return;
        }
        // Record before releasing so the log order matches the real windows
        if let Some(table) = self.table.upgrade() {
            table.record(self.handle, AccessKind::Unlock);
        }
        guard(&self.surface).locked = false;
        self.holds_lock = false;
    }

    fn read_into(&mut self, dst: &mut PixelBuffer) -> Result<(), TextureError> {
        if !self.holds_lock {
            return Err(TextureError::NotLocked(self.handle));
        }
        let surface = guard(&self.surface);
        Self::check_len(surface.data.len(), dst.as_bytes().len())?;
        dst.as_bytes_mut().copy_from_slice(&surface.data);
        Ok(())
    }

    fn write_from(&mut self, src: &PixelBuffer) -> Result<(), TextureError> {
        if !self.holds_lock {
            return Err(TextureError::NotLocked(self.handle));
        }
        let mut surface = guard(&self.surface);
        Self::check_len(surface.data.len(), src.as_bytes().len())?;
        surface.data.copy_from_slice(src.as_bytes());
        Ok(())
    }
}

impl Drop for MemoryTexture {
    fn drop(&mut self) {
        self.unlock();
        if self.exported
            && let Some(table) = self.table.upgrade()
        {
            guard(&table.surfaces).remove(&self.handle);
            debug!(handle = self.handle, "Released memory texture");
        }
    }
}
