//! The rendering engine seam
//!
//! [`Engine`] mirrors the subset of the PDFium C API the bridge depends on.
//! The native implementation lives in `native.rs` (feature `pdfium`); tests
//! use the in-memory [`FakeEngine`](crate::testing::FakeEngine).
//!
//! Native handles cross this seam as typed, non-null newtypes. An absent
//! handle is `None`, never a null pointer.

use std::ffi::c_void;
use std::ptr::NonNull;

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(NonNull<c_void>);

        impl $name {
            /// Wrap a native pointer, returning `None` for null.
            pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            /// The native pointer.
            pub fn as_ptr(self) -> *mut c_void {
                self.0.as_ptr()
            }
        }
    };
}

raw_handle!(
    /// An open native document (`FPDF_DOCUMENT`).
    RawDocument
);
raw_handle!(
    /// A loaded native page (`FPDF_PAGE`).
    RawPage
);
raw_handle!(
    /// An engine bitmap wrapping caller memory (`FPDF_BITMAP`).
    RawBitmap
);
raw_handle!(
    /// An annotation opened from a page (`FPDF_ANNOTATION`).
    RawAnnotation
);
raw_handle!(
    /// A link dictionary (`FPDF_LINK`). Borrowed from its annotation.
    RawLink
);
raw_handle!(
    /// A link action (`FPDF_ACTION`). Borrowed from its link.
    RawAction
);
raw_handle!(
    /// A destination (`FPDF_DEST`). Borrowed from its document.
    RawDest
);

// PDFium error codes (fpdfview.h)
pub const FPDF_ERR_SUCCESS: u64 = 0;
pub const FPDF_ERR_UNKNOWN: u64 = 1;
pub const FPDF_ERR_FILE: u64 = 2;
pub const FPDF_ERR_FORMAT: u64 = 3;
pub const FPDF_ERR_PASSWORD: u64 = 4;
pub const FPDF_ERR_SECURITY: u64 = 5;
pub const FPDF_ERR_PAGE: u64 = 6;

// Annotation subtype (fpdf_annot.h)
pub const FPDF_ANNOT_LINK: i32 = 2;

// Action types (fpdf_doc.h)
pub const PDFACTION_UNSUPPORTED: u64 = 0;
pub const PDFACTION_GOTO: u64 = 1;
pub const PDFACTION_REMOTEGOTO: u64 = 2;
pub const PDFACTION_URI: u64 = 3;
pub const PDFACTION_LAUNCH: u64 = 4;

// Bitmap format (fpdfview.h)
pub const FPDF_BITMAP_BGRX: i32 = 2;

// Render flags (fpdfview.h)
pub const FPDF_ANNOT: i32 = 0x01;
pub const FPDF_NO_CATCH: i32 = 0x100;

/// Opaque white in the engine's 0xAARRGGBB fill encoding.
pub const FILL_OPAQUE_WHITE: u32 = 0xFFFF_FFFF;

/// Decoded `FPDF_GetLastError` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeErrorCode {
    Success,
    Unknown,
    File,
    Format,
    Password,
    Security,
    Page,
    /// A code this bridge does not know (XFA errors, newer engines).
    Other(u64),
}

impl NativeErrorCode {
    /// Convert from raw PDFium value.
    pub fn from_raw(code: u64) -> Self {
        match code {
            FPDF_ERR_SUCCESS => NativeErrorCode::Success,
            FPDF_ERR_UNKNOWN => NativeErrorCode::Unknown,
            FPDF_ERR_FILE => NativeErrorCode::File,
            FPDF_ERR_FORMAT => NativeErrorCode::Format,
            FPDF_ERR_PASSWORD => NativeErrorCode::Password,
            FPDF_ERR_SECURITY => NativeErrorCode::Security,
            FPDF_ERR_PAGE => NativeErrorCode::Page,
            other => NativeErrorCode::Other(other),
        }
    }
}

impl std::fmt::Display for NativeErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeErrorCode::Success => write!(f, "no error"),
            NativeErrorCode::Unknown => write!(f, "unknown error"),
            NativeErrorCode::File => write!(f, "file not found or could not be opened"),
            NativeErrorCode::Format => write!(f, "file not in PDF format or corrupted"),
            NativeErrorCode::Password => write!(f, "password required or incorrect"),
            NativeErrorCode::Security => write!(f, "unsupported security scheme"),
            NativeErrorCode::Page => write!(f, "page not found or content error"),
            NativeErrorCode::Other(_) => write!(f, "unrecognized error"),
        }
    }
}

/// A rectangle in page space (`FS_RECTF`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageRect {
    /// Left edge in page coordinates.
    pub left: f32,
    /// Top edge in page coordinates.
    pub top: f32,
    /// Right edge in page coordinates.
    pub right: f32,
    /// Bottom edge in page coordinates.
    pub bottom: f32,
}

impl PageRect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// The PDFium operations the bridge is built on.
///
/// Implementations must be callable from any thread. Calls that must not
/// interleave (library init/destroy, and a document load together with the
/// `last_error` read that follows it) are serialized by
/// [`EngineGuard`](crate::guard::EngineGuard); everything else is only
/// issued while the library is initialized.
#[allow(clippy::too_many_arguments)]
pub trait Engine: Send + Sync {
    /// `FPDF_InitLibrary`
    fn init_library(&self);

    /// `FPDF_DestroyLibrary`
    fn destroy_library(&self);

    /// `FPDF_GetLastError`
    fn last_error(&self) -> u64;

    /// `FPDF_LoadDocument`. `None` on failure; consult [`Engine::last_error`].
    fn load_document(&self, path: &str, password: Option<&str>) -> Option<RawDocument>;

    /// `FPDF_CloseDocument`
    fn close_document(&self, document: RawDocument);

    /// `FPDF_GetPageCount`. Negative on failure.
    fn page_count(&self, document: RawDocument) -> i32;

    /// `FPDF_GetPageSizeByIndex`, in points.
    fn page_size_by_index(&self, document: RawDocument, index: i32) -> Option<(f64, f64)>;

    /// `FPDF_LoadPage`
    fn load_page(&self, document: RawDocument, index: i32) -> Option<RawPage>;

    /// `FPDF_ClosePage`
    fn close_page(&self, page: RawPage);

    /// `FPDFBitmap_CreateEx` over caller-supplied memory.
    ///
    /// # Safety
    ///
    /// `first_scan` must point to at least `stride * height` writable bytes
    /// that stay valid and unaliased until [`Engine::destroy_bitmap`] is
    /// called for the returned bitmap.
    unsafe fn create_bitmap(
        &self,
        width: i32,
        height: i32,
        format: i32,
        first_scan: NonNull<u8>,
        stride: i32,
    ) -> Option<RawBitmap>;

    /// `FPDFBitmap_FillRect`; `color` is 0xAARRGGBB. Returns whether the
    /// fill succeeded.
    fn fill_rect(&self, bitmap: RawBitmap, left: i32, top: i32, width: i32, height: i32, color: u32) -> bool;

    /// `FPDF_RenderPageBitmap`.
    ///
    /// Returns `false` when the engine reports a failure. PDFium itself does
    /// not report one; with `FPDF_NO_CATCH` its failures propagate instead.
    fn render_page_bitmap(
        &self,
        bitmap: RawBitmap,
        page: RawPage,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        rotate: i32,
        flags: i32,
    ) -> bool;

    /// `FPDFBitmap_Destroy`. Does not free caller-supplied memory.
    fn destroy_bitmap(&self, bitmap: RawBitmap);

    /// `FPDFPage_GetAnnotCount`
    fn annotation_count(&self, page: RawPage) -> i32;

    /// `FPDFPage_GetAnnot`
    fn annotation(&self, page: RawPage, index: i32) -> Option<RawAnnotation>;

    /// `FPDFPage_CloseAnnot`
    fn close_annotation(&self, annotation: RawAnnotation);

    /// `FPDFAnnot_GetSubtype`
    fn annotation_subtype(&self, annotation: RawAnnotation) -> i32;

    /// `FPDFAnnot_GetRect`
    fn annotation_rect(&self, annotation: RawAnnotation) -> Option<PageRect>;

    /// `FPDFAnnot_GetLink`
    fn annotation_link(&self, annotation: RawAnnotation) -> Option<RawLink>;

    /// `FPDFLink_GetAction`
    fn link_action(&self, link: RawLink) -> Option<RawAction>;

    /// `FPDFLink_GetDest`
    fn link_dest(&self, document: RawDocument, link: RawLink) -> Option<RawDest>;

    /// `FPDFAction_GetType`
    fn action_type(&self, action: RawAction) -> u64;

    /// `FPDFAction_GetDest`
    fn action_dest(&self, document: RawDocument, action: RawAction) -> Option<RawDest>;

    /// `FPDFAction_GetURIPath`.
    ///
    /// Returns the length of the NUL-terminated URI in bytes. The buffer is
    /// only written when it is large enough; pass an empty buffer to query
    /// the length.
    fn action_uri_path(&self, document: RawDocument, action: RawAction, buffer: &mut [u8]) -> usize;

    /// `FPDFDest_GetDestPageIndex`. Negative on failure.
    fn dest_page_index(&self, document: RawDocument, dest: RawDest) -> i32;
}
