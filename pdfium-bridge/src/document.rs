//! Document handle
//!
//! A [`Document`] exclusively owns one native document. The native resource
//! is released exactly once: by [`Document::close`] or on drop, whichever
//! comes first. Engine usage is released right after the native close.

use crate::engine::{Engine, RawDocument};
use crate::error::{BridgeError, Result};
use crate::guard::{EngineGuard, EngineLease};
use crate::page::{PageGuard, PageSize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// An opened PDF document.
///
/// A document must not be used from two threads at once; it can be moved
/// between threads.
pub struct Document {
    inner: Option<OpenDocument>,
}

pub(crate) struct OpenDocument {
    raw: RawDocument,
    // Dropped after `raw` is closed in `Drop::drop`.
    lease: EngineLease,
}

// SAFETY: the native document is exclusively owned and never used
// concurrently; the engine itself is Send + Sync.
unsafe impl Send for OpenDocument {}

impl OpenDocument {
    pub(crate) fn raw(&self) -> RawDocument {
        self.raw
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.lease.engine()
    }
}

impl Drop for OpenDocument {
    fn drop(&mut self) {
        let engine = self.lease.engine();
        let raw = self.raw;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| engine.close_document(raw))) {
            log::error!("Exception during close: {}", panic_message(&*payload));
        }
    }
}

impl Document {
    pub(crate) fn open(guard: &Arc<EngineGuard>, path: &str, password: Option<&str>) -> Result<Self> {
        if path.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "File path cannot be empty".to_string(),
            ));
        }
        if path.contains('\0') {
            return Err(BridgeError::InvalidArgument(
                "File path contains a NUL byte".to_string(),
            ));
        }

        let password = password.filter(|p| !p.is_empty());
        if password.is_some_and(|p| p.contains('\0')) {
            return Err(BridgeError::InvalidArgument(
                "Password contains a NUL byte".to_string(),
            ));
        }

        let (lease, loaded) = guard.acquire_with(|engine| {
            engine
                .load_document(path, password)
                .ok_or_else(|| engine.last_error())
        });
        let raw = match loaded {
            Ok(raw) => raw,
            Err(code) => {
                let err = BridgeError::from_open_failure(code, password.is_some());
                log::error!("Failed to open PDF document {path}: {err}");
                return Err(err);
            }
        };

        log::debug!("Opened PDF document {path}");
        Ok(Self {
            inner: Some(OpenDocument { raw, lease }),
        })
    }

    /// Close the document, releasing the native resource.
    ///
    /// Idempotent and never fails. A panic raised by the engine while
    /// closing is logged and swallowed.
    pub fn close(&mut self) {
        if let Some(open) = self.inner.take() {
            drop(open);
            log::debug!("Closed PDF document");
        }
    }

    /// Whether the document still wraps a live native resource.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Get the number of pages.
    ///
    /// # Errors
    ///
    /// `InvalidState` once closed, `IoFailure` if the engine reports a
    /// negative count.
    pub fn page_count(&self) -> Result<i32> {
        let open = self.open_inner()?;
        let count = open.engine().page_count(open.raw());
        if count < 0 {
            return Err(BridgeError::io("Failed to get page count"));
        }
        Ok(count)
    }

    /// Get the size of a page in points.
    ///
    /// The page is loaded to validate the index before its size is trusted,
    /// and released before returning.
    ///
    /// # Errors
    ///
    /// `InvalidState` once closed, `IoFailure` if the page cannot be loaded
    /// or measured.
    pub fn page_size(&self, index: i32) -> Result<PageSize> {
        let open = self.open_inner()?;
        let page = PageGuard::load(open, index)?;
        page.size()
    }

    pub(crate) fn open_inner(&self) -> Result<&OpenDocument> {
        self.inner.as_ref().ok_or_else(BridgeError::not_open)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("valid", &self.is_valid())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDocument, FakeEngine, FakePage};
    use crate::Library;

    fn library_with(engine: &Arc<FakeEngine>) -> Library {
        Library::new(engine.clone())
    }

    #[test]
    fn test_empty_path_rejected_without_engine_init() {
        let engine = Arc::new(FakeEngine::new());
        let library = library_with(&engine);

        let err = library.open_document("", None).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        assert_eq!(engine.stats().init_calls, 0);
    }

    #[test]
    fn test_empty_password_treated_as_none() {
        let engine = Arc::new(FakeEngine::new());
        engine.add_document("/secret.pdf", FakeDocument::new().with_password("hunter2"));
        let library = library_with(&engine);

        let err = library.open_document("/secret.pdf", Some("")).unwrap_err();
        assert!(matches!(err, BridgeError::PasswordRequired { code: 4 }));
    }

    #[test]
    fn test_nul_in_path_rejected() {
        let engine = Arc::new(FakeEngine::new());
        let library = library_with(&engine);

        let err = library.open_document("/a\0b.pdf", None).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_drop_closes_native_document() {
        let engine = Arc::new(FakeEngine::new());
        engine.add_document("/a.pdf", FakeDocument::new().with_page(FakePage::letter()));
        let library = library_with(&engine);

        let doc = library.open_document("/a.pdf", None).unwrap();
        assert_eq!(engine.stats().open_documents, 1);
        drop(doc);

        let stats = engine.stats();
        assert_eq!(stats.open_documents, 0);
        assert_eq!(stats.destroy_calls, 1);
    }

    #[test]
    fn test_panicking_close_is_swallowed() {
        let engine = Arc::new(FakeEngine::new());
        engine.add_document("/a.pdf", FakeDocument::new().with_page(FakePage::letter()));
        let library = library_with(&engine);

        let mut doc = library.open_document("/a.pdf", None).unwrap();
        engine.panic_on_close(true);
        doc.close();

        assert!(!doc.is_valid());
        // Engine usage is still released.
        assert!(!library.engine_state().initialized);
    }

    #[test]
    fn test_page_size_closes_page() {
        let engine = Arc::new(FakeEngine::new());
        engine.add_document(
            "/a.pdf",
            FakeDocument::new().with_page(FakePage::new(300.0, 400.0)),
        );
        let library = library_with(&engine);
        let doc = library.open_document("/a.pdf", None).unwrap();

        let size = doc.page_size(0).unwrap();
        assert_eq!((size.width, size.height), (300.0, 400.0));
        assert_eq!(engine.stats().open_pages, 0);
        assert_eq!(engine.stats().page_loads, 1);
    }

    #[test]
    fn test_negative_page_count_is_io_failure() {
        let engine = Arc::new(FakeEngine::new());
        engine.add_document("/a.pdf", FakeDocument::new().with_page_count_override(-1));
        let library = library_with(&engine);
        let doc = library.open_document("/a.pdf", None).unwrap();

        let err = doc.page_count().unwrap_err();
        assert!(matches!(err, BridgeError::IoFailure { .. }));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
