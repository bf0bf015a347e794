//! Main entry point

use crate::config::BridgeConfig;
use crate::document::Document;
use crate::engine::Engine;
use crate::error::Result;
use crate::guard::{EngineGuard, EngineState};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// The process-wide library, bound on first use.
static GLOBAL: OnceCell<Library> = OnceCell::new();

/// Main entry point for opening documents.
///
/// A `Library` owns one engine and its [`EngineGuard`]. Documents opened
/// through it keep the engine initialized until the last one is closed.
///
/// # Example
///
/// ```no_run
/// use pdfium_bridge::Library;
///
/// let library = Library::global()?;
/// let mut doc = library.open_document("document.pdf", None)?;
/// println!("Pages: {}", doc.page_count()?);
/// doc.close();
/// # Ok::<(), pdfium_bridge::BridgeError>(())
/// ```
#[derive(Clone)]
pub struct Library {
    guard: Arc<EngineGuard>,
}

impl Library {
    /// Create a library over a specific engine.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            guard: Arc::new(EngineGuard::new(engine)),
        }
    }

    /// The process-wide library.
    ///
    /// Unless one was installed with [`Library::install_global`], the first
    /// call binds the native PDFium library using [`BridgeConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DocumentOpenFailed`](crate::BridgeError::DocumentOpenFailed)
    /// if no engine can be bound.
    pub fn global() -> Result<&'static Library> {
        GLOBAL.get_or_try_init(|| Self::bind_native(&BridgeConfig::from_env()))
    }

    /// Install the process-wide library.
    ///
    /// Must happen before the first call to [`Library::global`]. Returns the
    /// library back if a global one already exists.
    pub fn install_global(library: Library) -> std::result::Result<(), Library> {
        GLOBAL.set(library)
    }

    /// Bind the native PDFium library.
    #[cfg(feature = "pdfium")]
    pub fn bind_native(config: &BridgeConfig) -> Result<Self> {
        let engine = crate::native::PdfiumEngine::bind(config)?;
        Ok(Self::new(Arc::new(engine)))
    }

    /// Bind the native PDFium library (unavailable in this build).
    #[cfg(not(feature = "pdfium"))]
    pub fn bind_native(config: &BridgeConfig) -> Result<Self> {
        Err(crate::error::BridgeError::DocumentOpenFailed {
            reason: format!(
                "PDF engine not available (search dirs: {:?}). Build with --features pdfium \
                 or install an engine with Library::install_global",
                config.search_dirs()
            ),
        })
    }

    /// Open a PDF document from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the PDF file
    /// * `password` - Optional password for encrypted PDFs; an empty password
    ///   is treated as none
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` for an empty path
    /// * `PasswordRequired` / `InvalidPassword` for encrypted documents
    /// * `DocumentOpenFailed` for every other engine failure
    pub fn open_document(&self, path: &str, password: Option<&str>) -> Result<Document> {
        Document::open(&self.guard, path, password)
    }

    /// Current engine lifecycle state.
    pub fn engine_state(&self) -> EngineState {
        self.guard.state()
    }
}
