//! Link annotation extraction

use crate::document::Document;
use crate::engine::{
    Engine, PageRect, RawAction, RawAnnotation, RawDest, RawDocument, RawLink, RawPage,
    FPDF_ANNOT_LINK, PDFACTION_GOTO, PDFACTION_URI,
};
use crate::error::{BridgeError, Result};
use crate::page::PageGuard;

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// External URI.
    Uri(String),
    /// Zero-based page index within the same document.
    Page(u32),
    /// Neither a URI nor a resolvable destination.
    Unresolved,
}

/// A link annotation on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Bounding rectangle in page coordinates.
    pub rect: PageRect,
    pub target: LinkTarget,
}

impl Link {
    /// The URI, if this is an external link.
    pub fn uri(&self) -> Option<&str> {
        match &self.target {
            LinkTarget::Uri(uri) => Some(uri),
            _ => None,
        }
    }

    /// The destination page, if this is an internal link.
    pub fn destination_page(&self) -> Option<u32> {
        match self.target {
            LinkTarget::Page(page) => Some(page),
            _ => None,
        }
    }
}

/// An open annotation; closed on drop.
struct AnnotationGuard<'a> {
    engine: &'a dyn Engine,
    raw: RawAnnotation,
}

impl<'a> AnnotationGuard<'a> {
    fn open(engine: &'a dyn Engine, page: RawPage, index: i32) -> Option<Self> {
        let raw = engine.annotation(page, index)?;
        Some(Self { engine, raw })
    }

    fn raw(&self) -> RawAnnotation {
        self.raw
    }
}

impl Drop for AnnotationGuard<'_> {
    fn drop(&mut self) {
        self.engine.close_annotation(self.raw);
    }
}

impl Document {
    /// Extract the link annotations of a page, in annotation order.
    ///
    /// Annotations of other subtypes and links without a readable rectangle
    /// are skipped. Nothing is sorted or deduplicated.
    ///
    /// # Errors
    ///
    /// `InvalidState` once closed, `IoFailure` if the page cannot be loaded,
    /// `OutOfMemory` if the result cannot be allocated.
    pub fn links_for_page(&self, index: i32) -> Result<Vec<Link>> {
        let open = self.open_inner()?;
        let page = PageGuard::load(open, index)?;
        let engine = page.engine();

        let count = engine.annotation_count(page.raw());
        let mut links = Vec::new();

        for i in 0..count.max(0) {
            let Some(annotation) = AnnotationGuard::open(engine, page.raw(), i) else {
                continue;
            };
            if engine.annotation_subtype(annotation.raw()) != FPDF_ANNOT_LINK {
                continue;
            }
            let Some(rect) = engine.annotation_rect(annotation.raw()) else {
                log::debug!("Skipping link annotation {i} on page {index}: no rectangle");
                continue;
            };

            let target = match engine.annotation_link(annotation.raw()) {
                Some(link) => resolve_target(engine, page.document(), link)?,
                None => LinkTarget::Unresolved,
            };

            links
                .try_reserve(1)
                .map_err(|_| BridgeError::OutOfMemory("link list".to_string()))?;
            links.push(Link { rect, target });
        }

        log::debug!("Found {} links on page {index}", links.len());
        Ok(links)
    }
}

fn resolve_target(engine: &dyn Engine, document: RawDocument, link: RawLink) -> Result<LinkTarget> {
    if let Some(action) = engine.link_action(link) {
        match engine.action_type(action) {
            PDFACTION_URI => {
                return Ok(read_uri(engine, document, action)?
                    .map(LinkTarget::Uri)
                    .unwrap_or(LinkTarget::Unresolved));
            }
            PDFACTION_GOTO => {
                if let Some(dest) = engine.action_dest(document, action) {
                    return Ok(page_target(engine, document, dest));
                }
            }
            _ => {}
        }
    }

    Ok(engine
        .link_dest(document, link)
        .map(|dest| page_target(engine, document, dest))
        .unwrap_or(LinkTarget::Unresolved))
}

fn page_target(engine: &dyn Engine, document: RawDocument, dest: RawDest) -> LinkTarget {
    u32::try_from(engine.dest_page_index(document, dest))
        .map(LinkTarget::Page)
        .unwrap_or(LinkTarget::Unresolved)
}

/// Read an action's URI as an owned string.
///
/// The engine reports the NUL-terminated length first and fills the buffer
/// on a second call. The result stops at the first NUL; an empty URI reads
/// as `None`.
fn read_uri(engine: &dyn Engine, document: RawDocument, action: RawAction) -> Result<Option<String>> {
    let len = engine.action_uri_path(document, action, &mut []);
    if len <= 1 {
        return Ok(None);
    }

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| BridgeError::OutOfMemory(format!("URI buffer of {len} bytes")))?;
    buffer.resize(len, 0);

    let written = engine.action_uri_path(document, action, &mut buffer);
    if written == 0 || written > buffer.len() {
        return Ok(None);
    }
    buffer.truncate(written);
    if let Some(nul) = buffer.iter().position(|&b| b == 0) {
        buffer.truncate(nul);
    }

    if buffer.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAction, FakeAnnotation, FakeDocument, FakeEngine, FakePage};
    use crate::Library;
    use std::sync::Arc;

    fn open_with(page: FakePage) -> (Arc<FakeEngine>, Library) {
        let engine = Arc::new(FakeEngine::new());
        engine.add_document("/links.pdf", FakeDocument::new().with_page(page));
        let library = Library::new(engine.clone());
        (engine, library)
    }

    #[test]
    fn test_link_accessors() {
        let link = Link {
            rect: PageRect::default(),
            target: LinkTarget::Uri("https://example.com".to_string()),
        };
        assert_eq!(link.uri(), Some("https://example.com"));
        assert_eq!(link.destination_page(), None);

        let link = Link {
            rect: PageRect::default(),
            target: LinkTarget::Page(3),
        };
        assert_eq!(link.uri(), None);
        assert_eq!(link.destination_page(), Some(3));
    }

    #[test]
    fn test_uri_and_destination_links() {
        let rect = PageRect::new(10.0, 50.0, 100.0, 30.0);
        let page = FakePage::letter()
            .with_annotation(FakeAnnotation::link(rect).with_action(FakeAction::uri("https://example.com/a")))
            .with_annotation(FakeAnnotation::link(rect).with_dest(2))
            .with_annotation(FakeAnnotation::link(rect).with_action(FakeAction::goto(1)));
        let (engine, library) = open_with(page);
        let doc = library.open_document("/links.pdf", None).unwrap();

        let links = doc.links_for_page(0).unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].uri(), Some("https://example.com/a"));
        assert_eq!(links[0].rect, rect);
        assert_eq!(links[1].destination_page(), Some(2));
        assert_eq!(links[2].destination_page(), Some(1));

        let stats = engine.stats();
        assert_eq!(stats.open_annotations, 0);
        assert_eq!(stats.open_pages, 0);
    }

    #[test]
    fn test_non_link_and_rectless_annotations_skipped() {
        let rect = PageRect::new(0.0, 10.0, 10.0, 0.0);
        let page = FakePage::letter()
            .with_annotation(FakeAnnotation::other(9, rect))
            .with_annotation(FakeAnnotation::link(rect).with_action(FakeAction::uri("https://one")))
            .with_annotation(FakeAnnotation::link_without_rect().with_dest(0))
            .with_annotation(FakeAnnotation::link(rect).with_dest(4));
        let (engine, library) = open_with(page);
        let doc = library.open_document("/links.pdf", None).unwrap();

        let links = doc.links_for_page(0).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].uri(), Some("https://one"));
        assert_eq!(links[1].destination_page(), Some(4));

        // Every annotation opened was closed, skipped ones included.
        let stats = engine.stats();
        assert_eq!(stats.annotation_opens, 4);
        assert_eq!(stats.open_annotations, 0);
    }

    #[test]
    fn test_unresolvable_links() {
        let rect = PageRect::new(0.0, 10.0, 10.0, 0.0);
        let page = FakePage::letter()
            .with_annotation(FakeAnnotation::link(rect))
            .with_annotation(FakeAnnotation::link(rect).with_action(FakeAction::uri("")))
            .with_annotation(FakeAnnotation::link(rect).with_dest(-1))
            .with_annotation(FakeAnnotation::link(rect).with_action(FakeAction::launch()));
        let (_engine, library) = open_with(page);
        let doc = library.open_document("/links.pdf", None).unwrap();

        let links = doc.links_for_page(0).unwrap();
        assert_eq!(links.len(), 4);
        assert!(links.iter().all(|l| l.target == LinkTarget::Unresolved));
    }

    #[test]
    fn test_uri_bytes_decoded_lossily() {
        let rect = PageRect::new(0.0, 10.0, 10.0, 0.0);
        let page = FakePage::letter().with_annotation(
            FakeAnnotation::link(rect).with_action(FakeAction::uri_bytes(b"http://a/\xFF")),
        );
        let (_engine, library) = open_with(page);
        let doc = library.open_document("/links.pdf", None).unwrap();

        let links = doc.links_for_page(0).unwrap();
        assert_eq!(links[0].uri(), Some("http://a/\u{FFFD}"));
    }

    #[test]
    fn test_page_load_failure_is_io_failure() {
        let (_engine, library) = open_with(FakePage::letter());
        let doc = library.open_document("/links.pdf", None).unwrap();

        let err = doc.links_for_page(5).unwrap_err();
        assert!(matches!(err, BridgeError::IoFailure { .. }));
    }
}
