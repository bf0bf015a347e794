//! Transient page access
//!
//! Pages are never stored: each operation loads the page it needs into a
//! [`PageGuard`] and the guard closes it on every exit path.

use crate::document::OpenDocument;
use crate::engine::{Engine, RawDocument, RawPage};
use crate::error::{BridgeError, Result};

/// Page dimensions in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A page loaded for the duration of one operation.
pub(crate) struct PageGuard<'a> {
    engine: &'a dyn Engine,
    document: RawDocument,
    raw: RawPage,
    index: i32,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn load(open: &'a OpenDocument, index: i32) -> Result<Self> {
        let engine = open.engine();
        let document = open.raw();
        let raw = engine
            .load_page(document, index)
            .ok_or_else(|| BridgeError::io(format!("Failed to load page {index}")))?;
        Ok(Self {
            engine,
            document,
            raw,
            index,
        })
    }

    pub(crate) fn raw(&self) -> RawPage {
        self.raw
    }

    pub(crate) fn engine(&self) -> &'a dyn Engine {
        self.engine
    }

    pub(crate) fn document(&self) -> RawDocument {
        self.document
    }

    /// Size by index; the loaded page only vouches that the index exists.
    pub(crate) fn size(&self) -> Result<PageSize> {
        let (width, height) = self
            .engine
            .page_size_by_index(self.document, self.index)
            .ok_or_else(|| BridgeError::io(format!("Failed to get size of page {}", self.index)))?;
        Ok(PageSize {
            width: width as f32,
            height: height as f32,
        })
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.engine.close_page(self.raw);
    }
}
