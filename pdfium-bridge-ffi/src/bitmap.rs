//! Caller-owned pixel buffers

use libc::c_void;
use pdfium_bridge::{BridgeError, PixelSurface, Result, SurfaceFormat, SurfaceInfo};
use std::ptr::NonNull;

/// Lock callback: returns the first scanline, or null on failure.
pub type PdfbLockPixelsFn = Option<unsafe extern "C" fn(user_data: *mut c_void) -> *mut c_void>;

/// Unlock callback, called once for every successful lock.
pub type PdfbUnlockPixelsFn = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// A pixel buffer owned by the caller.
///
/// Either `pixels` points at the memory directly, or `lock_pixels` (and
/// optionally `unlock_pixels`) hand it out on demand, receiving
/// `user_data`. The callbacks take precedence when set.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PdfbBitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row; at least `width * 4`
    pub stride: u32,
    /// Android bitmap format code; only RGBA_8888 (1) renders
    pub format: i32,
    /// Direct pixel memory, used when `lock_pixels` is null
    pub pixels: *mut c_void,
    /// Passed to the callbacks
    pub user_data: *mut c_void,
    pub lock_pixels: PdfbLockPixelsFn,
    pub unlock_pixels: PdfbUnlockPixelsFn,
}

/// [`PixelSurface`] view of a [`PdfbBitmap`].
pub(crate) struct ForeignSurface<'a> {
    bitmap: &'a PdfbBitmap,
    locked_by_callback: bool,
}

impl<'a> ForeignSurface<'a> {
    pub(crate) fn new(bitmap: &'a PdfbBitmap) -> Self {
        Self {
            bitmap,
            locked_by_callback: false,
        }
    }
}

// SAFETY: `pdfb_render_page_to_bitmap` requires the caller to provide
// `stride * height` writable bytes that nobody else touches during the call.
unsafe impl PixelSurface for ForeignSurface<'_> {
    fn info(&self) -> Result<SurfaceInfo> {
        Ok(SurfaceInfo {
            width: self.bitmap.width,
            height: self.bitmap.height,
            stride: self.bitmap.stride,
            format: SurfaceFormat::from_raw(self.bitmap.format),
        })
    }

    fn lock_pixels(&mut self) -> Result<NonNull<u8>> {
        let (ptr, by_callback) = match self.bitmap.lock_pixels {
            // SAFETY: caller-provided callback with caller-provided context.
            Some(lock) => (unsafe { lock(self.bitmap.user_data) }, true),
            None => (self.bitmap.pixels, false),
        };
        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| BridgeError::IoFailure {
            reason: "bitmap has no pixel memory".to_string(),
        })?;
        self.locked_by_callback = by_callback;
        Ok(ptr)
    }

    fn unlock_pixels(&mut self) {
        if !std::mem::take(&mut self.locked_by_callback) {
            return;
        }
        if let Some(unlock) = self.bitmap.unlock_pixels {
            // SAFETY: pairs with the successful lock above.
            unsafe { unlock(self.bitmap.user_data) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static LOCKS: AtomicUsize = AtomicUsize::new(0);
    static UNLOCKS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn lock(user_data: *mut c_void) -> *mut c_void {
        LOCKS.fetch_add(1, Ordering::SeqCst);
        user_data
    }

    unsafe extern "C" fn unlock(_user_data: *mut c_void) {
        UNLOCKS.fetch_add(1, Ordering::SeqCst);
    }

    fn bitmap(pixels: *mut c_void) -> PdfbBitmap {
        PdfbBitmap {
            width: 1,
            height: 1,
            stride: 4,
            format: 1,
            pixels,
            user_data: std::ptr::null_mut(),
            lock_pixels: None,
            unlock_pixels: None,
        }
    }

    #[test]
    fn test_direct_pixels() {
        let mut data = [0u8; 4];
        let bitmap = bitmap(data.as_mut_ptr().cast());
        let mut surface = ForeignSurface::new(&bitmap);

        assert_eq!(surface.info().unwrap().format, SurfaceFormat::Rgba8888);
        assert_eq!(surface.lock_pixels().unwrap().as_ptr(), data.as_mut_ptr());
        surface.unlock_pixels();
    }

    #[test]
    fn test_null_pixels_fail_to_lock() {
        let bitmap = bitmap(std::ptr::null_mut());
        let mut surface = ForeignSurface::new(&bitmap);
        assert!(matches!(
            surface.lock_pixels(),
            Err(BridgeError::IoFailure { .. })
        ));
    }

    #[test]
    fn test_callbacks_are_paired() {
        let mut data = [0u8; 4];
        let mut bitmap = bitmap(std::ptr::null_mut());
        bitmap.user_data = data.as_mut_ptr().cast();
        bitmap.lock_pixels = Some(lock);
        bitmap.unlock_pixels = Some(unlock);

        let mut surface = ForeignSurface::new(&bitmap);
        let ptr = surface.lock_pixels().unwrap();
        assert_eq!(ptr.as_ptr(), data.as_mut_ptr());
        surface.unlock_pixels();
        // A second unlock without a lock is ignored.
        surface.unlock_pixels();

        assert_eq!(LOCKS.load(Ordering::SeqCst), 1);
        assert_eq!(UNLOCKS.load(Ordering::SeqCst), 1);
    }
}
