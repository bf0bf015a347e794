//! # pdfium-bridge
//!
//! Leak-free, handle-based access to the PDFium rendering engine.
//!
//! - Open password-protected or plain documents with a typed error catalog
//! - Query page count and page size
//! - Render a page into caller-owned RGBA pixel memory
//! - Extract link annotations as URIs or internal page destinations
//!
//! Every native resource (document, page, bitmap, pixel lock, annotation) is
//! owned by a guard and released on every exit path. The engine's global
//! state is initialized on the first open and torn down after the last close.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfium_bridge::{Library, OwnedBitmap};
//!
//! let library = Library::global()?;
//! let doc = library.open_document("document.pdf", None)?;
//!
//! let size = doc.page_size(0)?;
//! let mut bitmap = OwnedBitmap::new(size.width as u32, size.height as u32);
//! doc.render_page_to_bitmap(0, &mut bitmap, 1.0)?;
//! bitmap.save_as_png("page_0.png")?;
//!
//! for link in doc.links_for_page(0)? {
//!     println!("{:?} -> {:?}", link.rect, link.target);
//! }
//! # Ok::<(), pdfium_bridge::BridgeError>(())
//! ```
//!
//! The native engine requires the `pdfium` feature. Without it, install an
//! engine with [`Library::install_global`] or build a [`Library`] directly.

mod config;
mod document;
mod engine;
mod error;
mod guard;
mod library;
mod links;
#[cfg(feature = "pdfium")]
mod native;
mod page;
mod render;
pub mod testing;

pub use config::{BridgeConfig, PDFIUM_LIB_DIR_ENV};
pub use document::Document;
pub use engine::{
    Engine, NativeErrorCode, PageRect, RawAction, RawAnnotation, RawBitmap, RawDest, RawDocument,
    RawLink, RawPage, FILL_OPAQUE_WHITE, FPDF_ANNOT, FPDF_ANNOT_LINK, FPDF_BITMAP_BGRX,
    FPDF_ERR_FILE, FPDF_ERR_FORMAT, FPDF_ERR_PAGE, FPDF_ERR_PASSWORD, FPDF_ERR_SECURITY,
    FPDF_ERR_SUCCESS, FPDF_ERR_UNKNOWN, FPDF_NO_CATCH, PDFACTION_GOTO, PDFACTION_LAUNCH,
    PDFACTION_REMOTEGOTO, PDFACTION_UNSUPPORTED, PDFACTION_URI,
};
pub use error::{BridgeError, ErrorKind, Result};
pub use guard::{EngineGuard, EngineLease, EngineState};
pub use library::Library;
pub use links::{Link, LinkTarget};
#[cfg(feature = "pdfium")]
pub use native::PdfiumEngine;
pub use page::PageSize;
pub use render::{
    swap_red_blue, OwnedBitmap, PixelSurface, RenderScale, SurfaceFormat, SurfaceInfo,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
