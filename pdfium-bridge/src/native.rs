//! Native engine over the PDFium shared library
//!
//! Binds libpdfium at runtime through `pdfium-render`'s raw bindings and
//! forwards each [`Engine`] call to the matching C function.

use crate::config::BridgeConfig;
use crate::engine::{
    Engine, PageRect, RawAction, RawAnnotation, RawBitmap, RawDest, RawDocument, RawLink,
    RawPage,
};
use crate::error::{BridgeError, Result};
use pdfium_render::prelude::{Pdfium, PdfiumLibraryBindings, FS_RECTF};
use std::os::raw::c_ulong;
use std::ptr::NonNull;

/// PDFium bound from a shared library.
pub struct PdfiumEngine {
    bindings: Box<dyn PdfiumLibraryBindings>,
}

// SAFETY: the bindings are a table of C function pointers. Library
// init/teardown and document loads are serialized by `EngineGuard`, and
// each document is only used from one thread at a time.
unsafe impl Send for PdfiumEngine {}
unsafe impl Sync for PdfiumEngine {}

impl PdfiumEngine {
    /// Bind the first PDFium library found in the configured locations.
    ///
    /// # Errors
    ///
    /// `DocumentOpenFailed` naming every location tried.
    pub fn bind(config: &BridgeConfig) -> Result<Self> {
        let mut tried = Vec::new();

        for dir in config.search_dirs() {
            let path = Pdfium::pdfium_platform_library_name_at_path(&dir);
            match Pdfium::bind_to_library(&path) {
                Ok(bindings) => {
                    log::info!("Bound PDFium from {}", path.display());
                    return Ok(Self { bindings });
                }
                Err(e) => {
                    log::debug!("PDFium not usable at {}: {e:?}", path.display());
                    tried.push(path.display().to_string());
                }
            }
        }

        if config.use_system_library {
            match Pdfium::bind_to_system_library() {
                Ok(bindings) => {
                    log::info!("Bound PDFium from the system library path");
                    return Ok(Self { bindings });
                }
                Err(e) => {
                    log::debug!("PDFium not found on the system library path: {e:?}");
                    tried.push("system library".to_string());
                }
            }
        }

        Err(BridgeError::DocumentOpenFailed {
            reason: format!("PDF engine not available (tried: {})", tried.join(", ")),
        })
    }
}

impl Engine for PdfiumEngine {
    fn init_library(&self) {
        self.bindings.FPDF_InitLibrary();
    }

    fn destroy_library(&self) {
        self.bindings.FPDF_DestroyLibrary();
    }

    fn last_error(&self) -> u64 {
        self.bindings.FPDF_GetLastError() as u64
    }

    fn load_document(&self, path: &str, password: Option<&str>) -> Option<RawDocument> {
        RawDocument::from_ptr(self.bindings.FPDF_LoadDocument(path, password).cast())
    }

    fn close_document(&self, document: RawDocument) {
        self.bindings.FPDF_CloseDocument(document.as_ptr().cast());
    }

    fn page_count(&self, document: RawDocument) -> i32 {
        self.bindings.FPDF_GetPageCount(document.as_ptr().cast())
    }

    fn page_size_by_index(&self, document: RawDocument, index: i32) -> Option<(f64, f64)> {
        let mut width = 0.0;
        let mut height = 0.0;
        let ok = self.bindings.FPDF_GetPageSizeByIndex(
            document.as_ptr().cast(),
            index,
            &mut width,
            &mut height,
        );
        (ok != 0).then_some((width, height))
    }

    fn load_page(&self, document: RawDocument, index: i32) -> Option<RawPage> {
        RawPage::from_ptr(self.bindings.FPDF_LoadPage(document.as_ptr().cast(), index).cast())
    }

    fn close_page(&self, page: RawPage) {
        self.bindings.FPDF_ClosePage(page.as_ptr().cast());
    }

    unsafe fn create_bitmap(
        &self,
        width: i32,
        height: i32,
        format: i32,
        first_scan: NonNull<u8>,
        stride: i32,
    ) -> Option<RawBitmap> {
        let bitmap = self.bindings.FPDFBitmap_CreateEx(
            width,
            height,
            format,
            first_scan.as_ptr().cast(),
            stride,
        );
        RawBitmap::from_ptr(bitmap.cast())
    }

    fn fill_rect(&self, bitmap: RawBitmap, left: i32, top: i32, width: i32, height: i32, color: u32) -> bool {
        self.bindings.FPDFBitmap_FillRect(
            bitmap.as_ptr().cast(),
            left,
            top,
            width,
            height,
            color.into(),
        ) != 0
    }

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
    ) -> bool {
        self.bindings.FPDF_RenderPageBitmap(
            bitmap.as_ptr().cast(),
            page.as_ptr().cast(),
            start_x,
            start_y,
            size_x,
            size_y,
            rotate,
            flags,
        );
        true
    }

    fn destroy_bitmap(&self, bitmap: RawBitmap) {
        self.bindings.FPDFBitmap_Destroy(bitmap.as_ptr().cast());
    }

    fn annotation_count(&self, page: RawPage) -> i32 {
        self.bindings.FPDFPage_GetAnnotCount(page.as_ptr().cast())
    }

    fn annotation(&self, page: RawPage, index: i32) -> Option<RawAnnotation> {
        RawAnnotation::from_ptr(self.bindings.FPDFPage_GetAnnot(page.as_ptr().cast(), index).cast())
    }

    fn close_annotation(&self, annotation: RawAnnotation) {
        self.bindings.FPDFPage_CloseAnnot(annotation.as_ptr().cast());
    }

    fn annotation_subtype(&self, annotation: RawAnnotation) -> i32 {
        self.bindings.FPDFAnnot_GetSubtype(annotation.as_ptr().cast()) as i32
    }

    fn annotation_rect(&self, annotation: RawAnnotation) -> Option<PageRect> {
        let mut rect = FS_RECTF {
            left: 0.0,
            top: 0.0,
            right: 0.0,
            bottom: 0.0,
        };
        let ok = self
            .bindings
            .FPDFAnnot_GetRect(annotation.as_ptr().cast(), &mut rect);
        (ok != 0).then(|| page_rect(&rect))
    }

    fn annotation_link(&self, annotation: RawAnnotation) -> Option<RawLink> {
        RawLink::from_ptr(self.bindings.FPDFAnnot_GetLink(annotation.as_ptr().cast()).cast())
    }

    fn link_action(&self, link: RawLink) -> Option<RawAction> {
        RawAction::from_ptr(self.bindings.FPDFLink_GetAction(link.as_ptr().cast()).cast())
    }

    fn link_dest(&self, document: RawDocument, link: RawLink) -> Option<RawDest> {
        let dest = self
            .bindings
            .FPDFLink_GetDest(document.as_ptr().cast(), link.as_ptr().cast());
        RawDest::from_ptr(dest.cast())
    }

    fn action_type(&self, action: RawAction) -> u64 {
        self.bindings.FPDFAction_GetType(action.as_ptr().cast()) as u64
    }

    fn action_dest(&self, document: RawDocument, action: RawAction) -> Option<RawDest> {
        let dest = self
            .bindings
            .FPDFAction_GetDest(document.as_ptr().cast(), action.as_ptr().cast());
        RawDest::from_ptr(dest.cast())
    }

    fn action_uri_path(&self, document: RawDocument, action: RawAction, buffer: &mut [u8]) -> usize {
        let (ptr, len) = if buffer.is_empty() {
            (std::ptr::null_mut(), 0)
        } else {
            (buffer.as_mut_ptr().cast(), buffer.len() as c_ulong)
        };
        self.bindings.FPDFAction_GetURIPath(
            document.as_ptr().cast(),
            action.as_ptr().cast(),
            ptr,
            len,
        ) as usize
    }

    fn dest_page_index(&self, document: RawDocument, dest: RawDest) -> i32 {
        self.bindings
            .FPDFDest_GetDestPageIndex(document.as_ptr().cast(), dest.as_ptr().cast())
    }
}

fn page_rect(rect: &FS_RECTF) -> PageRect {
    PageRect::new(rect.left, rect.top, rect.right, rect.bottom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_page_rect_keeps_edges() {
        let rect = FS_RECTF {
            left: 10.0,
            top: 80.0,
            right: 110.0,
            bottom: 60.0,
        };
        let rect = page_rect(&rect);
        assert_eq!((rect.width(), rect.height()), (100.0, 20.0));
    }

    #[test]
    fn test_bind_reports_every_location_tried() {
        let config = BridgeConfig {
            library_dir: Some("/nonexistent/pdfium".into()),
            search_executable_dir: false,
            search_current_dir: false,
            use_system_library: false,
        };

        let err = match PdfiumEngine::bind(&config) {
            Ok(_) => panic!("bound PDFium from a missing directory"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::DocumentOpenFailed);
        assert!(err.to_string().contains("/nonexistent/pdfium"), "{err}");
    }
}
