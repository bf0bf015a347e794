//! # pdfium-bridge-ffi
//!
//! C FFI surface for pdfium-bridge, for managed runtimes (JVM/ART, Swift,
//! .NET) that drive PDFium through a native bridge.
//!
//! ## Usage from C
//!
//! ```c
//! uint64_t doc = 0;
//! if (pdfb_open_document("/path/to/doc.pdf", NULL, &doc) != PDFB_STATUS_SUCCESS) {
//!     char *msg = pdfb_last_error_message();
//!     fprintf(stderr, "%s\n", msg);
//!     pdfb_string_free(msg);
//!     return;
//! }
//!
//! int32_t count = 0;
//! pdfb_get_page_count(doc, &count);
//!
//! PdfbLink *links = NULL;
//! size_t link_count = 0;
//! pdfb_get_links_for_page(doc, 0, &links, &link_count);
//! pdfb_links_free(links, link_count);
//!
//! pdfb_close_document(doc);
//! ```
//!
//! Documents are identified by `uint64_t` handles; `0` is the null handle.
//! Every call that can fail returns a [`PdfbStatus`] and stores a message
//! retrievable (per thread) with [`pdfb_last_error_message`].

mod bitmap;
mod handles;
mod marshal;

pub use bitmap::{PdfbBitmap, PdfbLockPixelsFn, PdfbUnlockPixelsFn};

use bitmap::ForeignSurface;
use libc::{c_char, size_t};
use marshal::{fail, guarded, guarded_or, invalid_argument, invalid_state};
use pdfium_bridge::{Library, Link, LinkTarget};
use std::ffi::CString;

/// A document handle; `0` is the null handle.
pub type PdfbDocument = u64;

/// The null document handle.
pub const PDFB_NULL_DOCUMENT: PdfbDocument = 0;

/// Result code for FFI operations
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfbStatus {
    /// Operation succeeded
    Success = 0,
    /// Null pointer, invalid string or unusable bitmap
    InvalidArgument = -1,
    /// Null, unknown or closed document handle
    InvalidState = -2,
    /// Page index out of range
    IndexOutOfBounds = -3,
    /// Encrypted document opened without a password
    PasswordRequired = -4,
    /// Encrypted document opened with a wrong password
    InvalidPassword = -5,
    /// Any other failure to open a document
    DocumentOpenFailed = -6,
    /// Page load, size query, pixel lock or render failure
    IoFailure = -7,
    /// Out of memory
    OutOfMemory = -8,
    /// Internal error (bug)
    InternalError = -99,
}

impl std::fmt::Display for PdfbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidState => "invalid state",
            Self::IndexOutOfBounds => "index out of bounds",
            Self::PasswordRequired => "password required",
            Self::InvalidPassword => "invalid password",
            Self::DocumentOpenFailed => "document open failed",
            Self::IoFailure => "io failure",
            Self::OutOfMemory => "out of memory",
            Self::InternalError => "internal error",
        };
        write!(f, "{s}")
    }
}

/// Rectangle in page coordinates (points)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PdfbRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// A link annotation
#[repr(C)]
#[derive(Debug)]
pub struct PdfbLink {
    /// Bounding rectangle
    pub rect: PdfbRect,
    /// Target URI (UTF-8), or null. Owned by the link array.
    pub uri: *mut c_char,
    /// Target page index, or -1
    pub dest_page: i32,
}

impl PdfbLink {
    fn from_link(link: &Link) -> Self {
        let uri = match &link.target {
            LinkTarget::Uri(uri) => CString::new(uri.as_str())
                .map(CString::into_raw)
                .unwrap_or(std::ptr::null_mut()),
            _ => std::ptr::null_mut(),
        };
        let dest_page = link
            .destination_page()
            .and_then(|page| i32::try_from(page).ok())
            .unwrap_or(-1);

        Self {
            rect: PdfbRect {
                left: link.rect.left,
                top: link.rect.top,
                right: link.rect.right,
                bottom: link.rect.bottom,
            },
            uri,
            dest_page,
        }
    }
}

// ============================================================================
// Document Lifecycle
// ============================================================================

/// Open a PDF document
///
/// # Arguments
/// - `path`: File path (UTF-8)
/// - `password`: Password (UTF-8), or null. An empty password counts as none.
/// - `out_handle`: Receives the document handle on success
///
/// # Returns
/// Result code
///
/// # Safety
/// - `path` must be a valid null-terminated string
/// - `password` must be null or a valid null-terminated string
/// - `out_handle` must be a valid writable pointer
#[no_mangle]
pub unsafe extern "C" fn pdfb_open_document(
    path: *const c_char,
    password: *const c_char,
    out_handle: *mut PdfbDocument,
) -> PdfbStatus {
    const CALL: &str = "pdfb_open_document";
    guarded(CALL, || {
        if out_handle.is_null() {
            return invalid_argument(CALL, "out_handle is null");
        }
        let path = match marshal::required_str(path, "path") {
            Ok(path) => path,
            Err(message) => return invalid_argument(CALL, &message),
        };
        let password = match marshal::optional_str(password, "password") {
            Ok(password) => password,
            Err(message) => return invalid_argument(CALL, &message),
        };

        let library = match Library::global() {
            Ok(library) => library,
            Err(e) => return fail(CALL, &e),
        };
        let document = match library.open_document(path, password) {
            Ok(document) => document,
            Err(e) => return fail(CALL, &e),
        };

        match handles::insert(document) {
            Ok(handle) => {
                *out_handle = handle;
                log::debug!("Opened {path} as handle {handle}");
                PdfbStatus::Success
            }
            Err(mut document) => {
                document.close();
                fail(
                    CALL,
                    &pdfium_bridge::BridgeError::OutOfMemory("document handle table".to_string()),
                )
            }
        }
    })
}

/// Close a document
///
/// Idempotent: closing a null, unknown or already closed handle does
/// nothing. Never fails.
#[no_mangle]
pub extern "C" fn pdfb_close_document(handle: PdfbDocument) {
    guarded_or("pdfb_close_document", (), || {
        if handle == PDFB_NULL_DOCUMENT {
            return;
        }
        if let Some(document) = handles::remove(handle) {
            handles::lock(&document).close();
        }
    });
}

/// Check whether a handle refers to an open document
#[no_mangle]
pub extern "C" fn pdfb_is_document_valid(handle: PdfbDocument) -> bool {
    guarded_or("pdfb_is_document_valid", false, || {
        let Some(document) = handles::get(handle) else {
            return false;
        };
        let valid = handles::lock(&document).is_valid();
        valid
    })
}

// ============================================================================
// Page Queries
// ============================================================================

/// Get the number of pages
///
/// # Safety
/// - `out_count` must be a valid writable pointer
#[no_mangle]
pub unsafe extern "C" fn pdfb_get_page_count(
    handle: PdfbDocument,
    out_count: *mut i32,
) -> PdfbStatus {
    const CALL: &str = "pdfb_get_page_count";
    guarded(CALL, || {
        if handle == PDFB_NULL_DOCUMENT {
            return invalid_state(CALL, "Document handle is null");
        }
        let Some(document) = handles::get(handle) else {
            return invalid_state(CALL, "Document is not valid");
        };
        if out_count.is_null() {
            return invalid_argument(CALL, "out_count is null");
        }

        let result = handles::lock(&document).page_count();
        match result {
            Ok(count) => {
                *out_count = count;
                PdfbStatus::Success
            }
            Err(e) => fail(CALL, &e),
        }
    })
}

/// Get the size of a page in points
///
/// # Safety
/// - `out_width` and `out_height` must be valid writable pointers
#[no_mangle]
pub unsafe extern "C" fn pdfb_get_page_size(
    handle: PdfbDocument,
    page_index: i32,
    out_width: *mut f32,
    out_height: *mut f32,
) -> PdfbStatus {
    const CALL: &str = "pdfb_get_page_size";
    guarded(CALL, || {
        if handle == PDFB_NULL_DOCUMENT {
            return invalid_state(CALL, "Document handle is null");
        }
        let Some(document) = handles::get(handle) else {
            return invalid_state(CALL, "Document is not valid");
        };
        if out_width.is_null() || out_height.is_null() {
            return invalid_argument(CALL, "output pointer is null");
        }

        let result = handles::lock(&document).page_size(page_index);
        match result {
            Ok(size) => {
                *out_width = size.width;
                *out_height = size.height;
                PdfbStatus::Success
            }
            Err(e) => fail(CALL, &e),
        }
    })
}

// ============================================================================
// Rendering
// ============================================================================

/// Render a page into a caller-owned RGBA_8888 buffer
///
/// The page is stretched to exactly fill the bitmap. `scale` is advisory.
///
/// # Safety
/// - `bitmap` must be a valid pointer to a `PdfbBitmap`
/// - the pixel memory (direct or from `lock_pixels`) must hold at least
///   `stride * height` writable bytes and must not be accessed by anyone
///   else until the call returns
#[no_mangle]
pub unsafe extern "C" fn pdfb_render_page_to_bitmap(
    handle: PdfbDocument,
    page_index: i32,
    bitmap: *const PdfbBitmap,
    scale: f32,
) -> PdfbStatus {
    const CALL: &str = "pdfb_render_page_to_bitmap";
    guarded(CALL, || {
        if handle == PDFB_NULL_DOCUMENT {
            return invalid_argument(CALL, "Document handle is null");
        }
        if bitmap.is_null() {
            return invalid_argument(CALL, "Bitmap is null");
        }
        let Some(document) = handles::get(handle) else {
            return invalid_state(CALL, "Document is not valid");
        };

        let mut surface = ForeignSurface::new(&*bitmap);
        let result = handles::lock(&document).render_page_to_bitmap(page_index, &mut surface, scale);
        match result {
            Ok(()) => PdfbStatus::Success,
            Err(e) => fail(CALL, &e),
        }
    })
}

// ============================================================================
// Links
// ============================================================================

/// Get the link annotations of a page
///
/// On success `*out_links` receives an array of `*out_count` links (null
/// when there are none). Free it with `pdfb_links_free`.
///
/// # Safety
/// - `out_links` and `out_count` must be valid writable pointers
#[no_mangle]
pub unsafe extern "C" fn pdfb_get_links_for_page(
    handle: PdfbDocument,
    page_index: i32,
    out_links: *mut *mut PdfbLink,
    out_count: *mut size_t,
) -> PdfbStatus {
    const CALL: &str = "pdfb_get_links_for_page";
    guarded(CALL, || {
        if handle == PDFB_NULL_DOCUMENT {
            return invalid_argument(CALL, "Document handle is null");
        }
        if out_links.is_null() || out_count.is_null() {
            return invalid_argument(CALL, "output pointer is null");
        }
        let Some(document) = handles::get(handle) else {
            return invalid_state(CALL, "Document is not valid");
        };

        let links = match handles::lock(&document).links_for_page(page_index) {
            Ok(links) => links,
            Err(e) => return fail(CALL, &e),
        };

        let mut records = Vec::new();
        if records.try_reserve_exact(links.len()).is_err() {
            return fail(
                CALL,
                &pdfium_bridge::BridgeError::OutOfMemory("link array".to_string()),
            );
        }
        records.extend(links.iter().map(PdfbLink::from_link));

        *out_count = records.len();
        *out_links = if records.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(records.into_boxed_slice()).cast::<PdfbLink>()
        };
        PdfbStatus::Success
    })
}

/// Free a link array returned by `pdfb_get_links_for_page`
///
/// # Safety
/// - `links` must be null or an array from `pdfb_get_links_for_page`
/// - `count` must be the count returned with it
/// - `links` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn pdfb_links_free(links: *mut PdfbLink, count: size_t) {
    if links.is_null() {
        return;
    }
    let records = Box::from_raw(std::ptr::slice_from_raw_parts_mut(links, count));
    for record in records.iter() {
        if !record.uri.is_null() {
            drop(CString::from_raw(record.uri));
        }
    }
}

// ============================================================================
// Errors and Strings
// ============================================================================

/// Get the message of the last failed call on this thread
///
/// # Returns
/// Newly allocated string (free with `pdfb_string_free`), or null if the
/// last call succeeded
#[no_mangle]
pub extern "C" fn pdfb_last_error_message() -> *mut c_char {
    marshal::last_error().map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Free a string returned by FFI functions
///
/// # Safety
/// - `s` must be a valid pointer from a pdfb_* function
/// - `s` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn pdfb_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Version Info
// ============================================================================

/// Get library version string
///
/// # Returns
/// Static version string (do not free)
#[no_mangle]
pub extern "C" fn pdfb_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast::<c_char>()
}

/// Check if the native PDFium engine was compiled in
#[no_mangle]
pub const extern "C" fn pdfb_has_native_engine() -> bool {
    cfg!(feature = "pdfium")
}

/// Number of documents currently open through this interface
#[no_mangle]
pub extern "C" fn pdfb_open_document_count() -> size_t {
    guarded_or("pdfb_open_document_count", 0, handles::open_count)
}
