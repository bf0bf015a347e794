//! Page rendering into caller-owned pixel memory
//!
//! The caller owns the pixel buffer; the bridge only borrows it for the
//! duration of one render call. Every resource taken during a render (the
//! transient page, the pixel lock, the engine bitmap) is held by a guard, so
//! each is released on every exit path, in reverse order of acquisition.

use crate::document::Document;
use crate::engine::{
    Engine, RawBitmap, FILL_OPAQUE_WHITE, FPDF_ANNOT, FPDF_BITMAP_BGRX, FPDF_NO_CATCH,
};
use crate::error::{BridgeError, Result};
use crate::page::{PageGuard, PageSize};
use std::path::Path;
use std::ptr::NonNull;

/// Pixel layout of a caller surface, using the Android bitmap format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    /// 4 bytes per pixel, R G B A in memory order. The only renderable format.
    Rgba8888,
    Rgb565,
    Rgba4444,
    Alpha8,
    RgbaF16,
    /// A format code this bridge does not know.
    Unknown(i32),
}

impl SurfaceFormat {
    /// Convert from raw format code.
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => SurfaceFormat::Rgba8888,
            4 => SurfaceFormat::Rgb565,
            7 => SurfaceFormat::Rgba4444,
            8 => SurfaceFormat::Alpha8,
            9 => SurfaceFormat::RgbaF16,
            other => SurfaceFormat::Unknown(other),
        }
    }

    /// Convert to raw format code.
    pub fn to_raw(self) -> i32 {
        match self {
            SurfaceFormat::Rgba8888 => 1,
            SurfaceFormat::Rgb565 => 4,
            SurfaceFormat::Rgba4444 => 7,
            SurfaceFormat::Alpha8 => 8,
            SurfaceFormat::RgbaF16 => 9,
            SurfaceFormat::Unknown(other) => other,
        }
    }
}

/// Geometry of a caller surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes (may be larger than `width * 4`).
    pub stride: u32,
    pub format: SurfaceFormat,
}

/// Caller-owned pixel memory with a lock/unlock discipline.
///
/// # Safety
///
/// While locked, the pointer returned by [`PixelSurface::lock_pixels`] must
/// be valid for reads and writes of `stride * height` bytes (as reported by
/// [`PixelSurface::info`]) and must not be accessed by anyone else until
/// [`PixelSurface::unlock_pixels`] is called.
pub unsafe trait PixelSurface {
    /// Geometry of the surface.
    fn info(&self) -> Result<SurfaceInfo>;

    /// Acquire exclusive write access to the pixel memory.
    fn lock_pixels(&mut self) -> Result<NonNull<u8>>;

    /// Release the access taken by [`PixelSurface::lock_pixels`].
    fn unlock_pixels(&mut self);
}

/// Effective per-axis scale from page points to target pixels.
///
/// The axes are independent: the page is stretched to exactly fill the
/// target regardless of aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderScale {
    pub x: f64,
    pub y: f64,
}

impl RenderScale {
    pub fn fit(target_width: u32, target_height: u32, page: PageSize) -> Self {
        Self {
            x: f64::from(target_width) / f64::from(page.width),
            y: f64::from(target_height) / f64::from(page.height),
        }
    }
}

/// Swap the 1st and 3rd byte of every 4-byte pixel, row by row.
///
/// Converts between BGRx and RGBx in place. Bytes between `width * 4` and
/// `stride` in each row are padding and are left alone.
pub fn swap_red_blue(pixels: &mut [u8], width: usize, height: usize, stride: usize) {
    if stride == 0 {
        return;
    }
    for row in pixels.chunks_mut(stride).take(height) {
        let row_bytes = (width * 4).min(row.len());
        for px in row[..row_bytes].chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
}

/// Validated render target geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderTarget {
    width: i32,
    height: i32,
    stride: i32,
    len: usize,
}

impl RenderTarget {
    fn validate(info: &SurfaceInfo) -> Result<Self> {
        let invalid = |msg: String| Err(BridgeError::InvalidArgument(msg));

        let (Ok(width), Ok(height), Ok(stride)) = (
            i32::try_from(info.width),
            i32::try_from(info.height),
            i32::try_from(info.stride),
        ) else {
            return invalid("Bitmap dimensions exceed engine limits".to_string());
        };
        if width <= 0 || height <= 0 {
            return invalid("Bitmap has invalid dimensions".to_string());
        }
        if info.format != SurfaceFormat::Rgba8888 {
            return invalid(format!("Unsupported bitmap format {:?}", info.format));
        }
        if (stride as usize) < (width as usize) * 4 {
            return invalid(format!(
                "Bitmap stride {stride} is smaller than a row of {width} pixels"
            ));
        }
        let Some(len) = (stride as usize).checked_mul(height as usize) else {
            return invalid("Bitmap size overflows".to_string());
        };

        Ok(Self {
            width,
            height,
            stride,
            len,
        })
    }
}

/// Exclusive access to a surface's pixels; unlocks on drop.
struct PixelLock<'a, S: PixelSurface + ?Sized> {
    surface: &'a mut S,
    ptr: NonNull<u8>,
}

impl<'a, S: PixelSurface + ?Sized> PixelLock<'a, S> {
    fn acquire(surface: &'a mut S) -> Result<Self> {
        let ptr = surface
            .lock_pixels()
            .map_err(|e| BridgeError::io(format!("Failed to lock bitmap pixels: {e}")))?;
        Ok(Self { surface, ptr })
    }

    fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// # Safety
    ///
    /// `len` must not exceed the locked region and no engine bitmap may
    /// still reference the memory.
    unsafe fn as_mut_slice(&mut self, len: usize) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), len)
    }
}

impl<S: PixelSurface + ?Sized> Drop for PixelLock<'_, S> {
    fn drop(&mut self) {
        self.surface.unlock_pixels();
    }
}

/// An engine bitmap over borrowed memory; destroyed on drop.
struct BitmapGuard<'a> {
    engine: &'a dyn Engine,
    raw: RawBitmap,
}

impl<'a> BitmapGuard<'a> {
    /// # Safety
    ///
    /// `pixels` must be valid for `target.len` bytes for the guard's lifetime.
    unsafe fn create(engine: &'a dyn Engine, pixels: NonNull<u8>, target: &RenderTarget) -> Result<Self> {
        let raw = engine
            .create_bitmap(target.width, target.height, FPDF_BITMAP_BGRX, pixels, target.stride)
            .ok_or_else(|| BridgeError::io("Failed to create engine bitmap"))?;
        Ok(Self { engine, raw })
    }

    fn raw(&self) -> RawBitmap {
        self.raw
    }
}

impl Drop for BitmapGuard<'_> {
    fn drop(&mut self) {
        self.engine.destroy_bitmap(self.raw);
    }
}

impl Document {
    /// Render a page so that it exactly fills the caller's surface.
    ///
    /// The surface is cleared to opaque white, the page (including its
    /// annotations) is stretched onto it per axis, and the engine's BGRx
    /// output is reordered to RGBA in place.
    ///
    /// `scale` is advisory: the effective scale always comes from the
    /// surface dimensions (see [`RenderScale::fit`]).
    ///
    /// # Errors
    ///
    /// * `InvalidState` once closed
    /// * `IndexOutOfBounds` for an index outside `0..page_count`; the surface
    ///   is not touched
    /// * `IoFailure` if the page cannot be loaded, the surface cannot be
    ///   locked, or the engine fails
    /// * `InvalidArgument` for an unusable surface geometry or format
    pub fn render_page_to_bitmap<S: PixelSurface + ?Sized>(
        &self,
        index: i32,
        surface: &mut S,
        scale: f32,
    ) -> Result<()> {
        let open = self.open_inner()?;
        let count = self.page_count()?;
        if index < 0 || index >= count {
            return Err(BridgeError::IndexOutOfBounds { index, count });
        }

        let page = PageGuard::load(open, index)?;
        let engine = page.engine();

        let info = surface
            .info()
            .map_err(|e| BridgeError::io(format!("Failed to lock bitmap pixels: {e}")))?;
        let mut pixels = PixelLock::acquire(surface)?;
        let target = RenderTarget::validate(&info)?;

        {
            // SAFETY: the surface contract covers `stride * height` bytes
            // until unlock, and the lock outlives the bitmap.
            let bitmap = unsafe { BitmapGuard::create(engine, pixels.ptr(), &target)? };
            let filled = engine.fill_rect(
                bitmap.raw(),
                0,
                0,
                target.width,
                target.height,
                FILL_OPAQUE_WHITE,
            );
            if !filled {
                return Err(BridgeError::io(format!("Failed to fill bitmap for page {index}")));
            }

            let fit = RenderScale::fit(info.width, info.height, page.size()?);
            log::debug!(
                "Rendering page {index} at {}x{} (scale {:.4}x{:.4}, requested {scale})",
                target.width,
                target.height,
                fit.x,
                fit.y
            );

            let rendered = engine.render_page_bitmap(
                bitmap.raw(),
                page.raw(),
                0,
                0,
                target.width,
                target.height,
                0,
                FPDF_ANNOT | FPDF_NO_CATCH,
            );
            if !rendered {
                return Err(BridgeError::io(format!("Failed to render page {index}")));
            }
        }

        // SAFETY: validated length, and the engine bitmap is gone.
        let data = unsafe { pixels.as_mut_slice(target.len) };
        swap_red_blue(
            data,
            target.width as usize,
            target.height as usize,
            target.stride as usize,
        );

        Ok(())
    }
}

/// A heap-allocated RGBA_8888 surface.
///
/// Useful for Rust callers that do not bring their own pixel memory.
#[derive(Debug, Clone)]
pub struct OwnedBitmap {
    width: u32,
    height: u32,
    stride: u32,
    data: Vec<u8>,
    locked: bool,
}

impl OwnedBitmap {
    /// Create a zeroed bitmap with tightly packed rows.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_stride(width, height, width.saturating_mul(4))
    }

    /// Create a zeroed bitmap with an explicit row stride.
    pub fn with_stride(width: u32, height: u32, stride: u32) -> Self {
        Self {
            width,
            height,
            stride,
            data: vec![0; stride as usize * height as usize],
            locked: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Raw bytes including row padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the pixels are currently locked by a render.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// RGBA bytes of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride as usize + x as usize * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Tightly packed RGBA bytes (row padding removed).
    pub fn to_rgba(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * 4;
        let mut rgba = Vec::with_capacity(row_bytes * self.height as usize);
        if self.stride == 0 {
            return rgba;
        }
        for row in self.data.chunks(self.stride as usize).take(self.height as usize) {
            rgba.extend_from_slice(&row[..row_bytes.min(row.len())]);
        }
        rgba
    }

    /// Save the bitmap as a PNG file.
    pub fn save_as_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use png::{BitDepth, ColorType, Encoder};
        use std::fs::File;
        use std::io::BufWriter;

        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| BridgeError::io(format!("Failed to create {}: {e}", path.display())))?;
        let writer = BufWriter::new(file);

        let mut encoder = Encoder::new(writer, self.width, self.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);

        let mut png_writer = encoder
            .write_header()
            .map_err(|e| BridgeError::io(format!("PNG encoding error: {e}")))?;
        png_writer
            .write_image_data(&self.to_rgba())
            .map_err(|e| BridgeError::io(format!("PNG encoding error: {e}")))?;

        Ok(())
    }
}

// SAFETY: `data` holds `stride * height` bytes and is only reachable through
// `&mut self` while locked.
unsafe impl PixelSurface for OwnedBitmap {
    fn info(&self) -> Result<SurfaceInfo> {
        Ok(SurfaceInfo {
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: SurfaceFormat::Rgba8888,
        })
    }

    fn lock_pixels(&mut self) -> Result<NonNull<u8>> {
        if self.locked {
            return Err(BridgeError::io("Bitmap pixels are already locked"));
        }
        let ptr = NonNull::new(self.data.as_mut_ptr())
            .ok_or_else(|| BridgeError::io("Bitmap has no pixel memory"))?;
        self.locked = true;
        Ok(ptr)
    }

    fn unlock_pixels(&mut self) {
        self.locked = false;
    }
}
