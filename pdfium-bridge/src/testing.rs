//! In-memory engine for tests
//!
//! [`FakeEngine`] implements [`Engine`] without libpdfium. Documents are
//! registered by path, every native handle it hands out is tracked, and
//! [`FakeEngine::stats`] reports what is still outstanding. Misuse (calls
//! before init, unknown or double-closed handles, teardown with open
//! documents) is recorded as a violation instead of crashing.

use crate::engine::{
    Engine, PageRect, RawAction, RawAnnotation, RawBitmap, RawDest, RawDocument, RawLink,
    RawPage, FPDF_ANNOT_LINK, FPDF_ERR_FILE, FPDF_ERR_FORMAT, FPDF_ERR_PASSWORD,
    FPDF_ERR_SUCCESS, PDFACTION_GOTO, PDFACTION_LAUNCH, PDFACTION_URI,
};
use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A link action.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeAction {
    kind: u64,
    uri: Vec<u8>,
    dest: Option<i32>,
}

impl FakeAction {
    pub fn uri(uri: &str) -> Self {
        Self::uri_bytes(uri.as_bytes())
    }

    /// A URI action with arbitrary (possibly non-UTF-8) bytes.
    pub fn uri_bytes(uri: &[u8]) -> Self {
        Self {
            kind: PDFACTION_URI,
            uri: uri.to_vec(),
            dest: None,
        }
    }

    /// A GoTo action to a page index.
    pub fn goto(page: i32) -> Self {
        Self {
            kind: PDFACTION_GOTO,
            uri: Vec::new(),
            dest: Some(page),
        }
    }

    pub fn launch() -> Self {
        Self {
            kind: PDFACTION_LAUNCH,
            uri: Vec::new(),
            dest: None,
        }
    }
}

/// A page annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeAnnotation {
    subtype: i32,
    rect: Option<PageRect>,
    action: Option<FakeAction>,
    dest: Option<i32>,
}

impl FakeAnnotation {
    pub fn link(rect: PageRect) -> Self {
        Self::other(FPDF_ANNOT_LINK, rect)
    }

    /// A link whose rectangle cannot be read.
    pub fn link_without_rect() -> Self {
        Self {
            subtype: FPDF_ANNOT_LINK,
            rect: None,
            action: None,
            dest: None,
        }
    }

    /// An annotation of any subtype.
    pub fn other(subtype: i32, rect: PageRect) -> Self {
        Self {
            subtype,
            rect: Some(rect),
            action: None,
            dest: None,
        }
    }

    pub fn with_action(mut self, action: FakeAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the link's own destination page.
    pub fn with_dest(mut self, page: i32) -> Self {
        self.dest = Some(page);
        self
    }
}

/// A page.
#[derive(Debug, Clone, PartialEq)]
pub struct FakePage {
    width: f64,
    height: f64,
    paint: Option<[u8; 4]>,
    annotations: Vec<FakeAnnotation>,
    fail_load: bool,
    fail_size: bool,
}

impl FakePage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            paint: None,
            annotations: Vec::new(),
            fail_load: false,
            fail_size: false,
        }
    }

    /// US Letter, 612 x 792 points.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// Paint every rendered pixel with `bgra`, in engine byte order.
    pub fn with_paint(mut self, bgra: [u8; 4]) -> Self {
        self.paint = Some(bgra);
        self
    }

    pub fn with_annotation(mut self, annotation: FakeAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Make `load_page` fail for this page.
    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Make the size query fail for this page.
    pub fn with_size_failure(mut self) -> Self {
        self.fail_size = true;
        self
    }
}

/// A registered document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeDocument {
    password: Option<String>,
    pages: Vec<FakePage>,
    page_count_override: Option<i32>,
    corrupt: bool,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document that fails to parse.
    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_page(mut self, page: FakePage) -> Self {
        self.pages.push(page);
        self
    }

    /// Report this page count instead of the number of pages.
    pub fn with_page_count_override(mut self, count: i32) -> Self {
        self.page_count_override = Some(count);
        self
    }
}

/// Counters and outstanding resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeStats {
    pub init_calls: usize,
    pub destroy_calls: usize,
    pub open_documents: usize,
    pub open_pages: usize,
    pub page_loads: usize,
    pub live_bitmaps: usize,
    pub bitmap_creates: usize,
    pub open_annotations: usize,
    pub annotation_opens: usize,
    pub render_calls: usize,
    /// Link, action and destination handles lent out by open annotations.
    pub borrowed_handles: usize,
    pub last_render_flags: Option<i32>,
    /// Contract violations, in the order they happened.
    pub violations: Vec<String>,
}

struct PixelPtr(NonNull<u8>);

// SAFETY: only dereferenced under the engine mutex while the bitmap is live.
unsafe impl Send for PixelPtr {}

struct FakeBitmap {
    pixels: PixelPtr,
    width: i32,
    height: i32,
    stride: i32,
}

enum Borrowed {
    Link(FakeAnnotation),
    Action(FakeAction),
    Dest(i32),
}

#[derive(Default)]
struct State {
    next_handle: usize,
    initialized: bool,
    last_error: u64,
    registered: HashMap<String, FakeDocument>,
    documents: HashMap<usize, FakeDocument>,
    pages: HashMap<usize, FakePage>,
    bitmaps: HashMap<usize, FakeBitmap>,
    annotations: HashMap<usize, FakeAnnotation>,
    // Keyed by handle; each entry remembers the annotation it came from.
    borrowed: HashMap<usize, (usize, Borrowed)>,
    panic_on_close: bool,
    failed_load_delay: Option<Duration>,
    fail_bitmap_create: bool,
    fail_fill: bool,
    fail_render: bool,
    stats: FakeStats,
}

impl State {
    fn next_handle(&mut self) -> *mut c_void {
        self.next_handle += 1;
        self.next_handle as *mut c_void
    }

    fn violation(&mut self, message: String) {
        self.stats.violations.push(message);
    }

    fn require_init(&mut self, call: &str) {
        if !self.initialized {
            self.violation(format!("{call} called before init"));
        }
    }

    fn document(&mut self, document: RawDocument, call: &str) -> Option<FakeDocument> {
        let doc = self.documents.get(&id(document.as_ptr())).cloned();
        if doc.is_none() {
            self.violation(format!("{call}: unknown document"));
        }
        doc
    }

    fn borrowed(&mut self, handle: *mut c_void, call: &str) -> Option<&Borrowed> {
        if !self.borrowed.contains_key(&id(handle)) {
            self.violation(format!("{call}: unknown handle"));
        }
        self.borrowed.get(&id(handle)).map(|(_, borrowed)| borrowed)
    }

    fn owner(&self, handle: *mut c_void) -> Option<usize> {
        self.borrowed.get(&id(handle)).map(|(owner, _)| *owner)
    }

    fn lend(&mut self, owner: usize, borrowed: Borrowed) -> *mut c_void {
        let handle = self.next_handle();
        self.borrowed.insert(id(handle), (owner, borrowed));
        handle
    }
}

fn id(ptr: *mut c_void) -> usize {
    ptr as usize
}

/// Write `bgra` into a rectangle of a bitmap, clipped to its bounds.
fn paint(bitmap: &FakeBitmap, left: i32, top: i32, width: i32, height: i32, bgra: [u8; 4]) {
    let x0 = left.clamp(0, bitmap.width) as usize;
    let x1 = left.saturating_add(width).clamp(0, bitmap.width) as usize;
    let y0 = top.clamp(0, bitmap.height) as usize;
    let y1 = top.saturating_add(height).clamp(0, bitmap.height) as usize;
    let stride = bitmap.stride as usize;

    for y in y0..y1 {
        for x in x0..x1 {
            // SAFETY: in bounds of the `stride * height` region promised to
            // `create_bitmap`.
            unsafe {
                let dst = bitmap.pixels.0.as_ptr().add(y * stride + x * 4);
                std::ptr::copy_nonoverlapping(bgra.as_ptr(), dst, 4);
            }
        }
    }
}

/// A resource-counting [`Engine`] double.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<State>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under `path`.
    pub fn add_document(&self, path: &str, document: FakeDocument) {
        self.lock().registered.insert(path.to_string(), document);
    }

    /// Panic from `close_document` (after releasing the document).
    pub fn panic_on_close(&self, enabled: bool) {
        self.lock().panic_on_close = enabled;
    }

    /// Sleep for `delay` after a failed load, before returning.
    ///
    /// Widens the window between a failed load and the read of its error
    /// code, where another thread's load could overwrite the code.
    pub fn delay_failed_loads(&self, delay: Duration) {
        self.lock().failed_load_delay = Some(delay);
    }

    pub fn fail_bitmap_create(&self, enabled: bool) {
        self.lock().fail_bitmap_create = enabled;
    }

    /// Make `fill_rect` report failure.
    pub fn fail_fill(&self, enabled: bool) {
        self.lock().fail_fill = enabled;
    }

    /// Make `render_page_bitmap` report failure.
    pub fn fail_render(&self, enabled: bool) {
        self.lock().fail_render = enabled;
    }

    pub fn stats(&self) -> FakeStats {
        let state = self.lock();
        FakeStats {
            open_documents: state.documents.len(),
            open_pages: state.pages.len(),
            live_bitmaps: state.bitmaps.len(),
            open_annotations: state.annotations.len(),
            borrowed_handles: state.borrowed.len(),
            ..state.stats.clone()
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Engine for FakeEngine {
    fn init_library(&self) {
        let mut state = self.lock();
        if state.initialized {
            state.violation("init_library called twice".to_string());
        }
        state.initialized = true;
        state.stats.init_calls += 1;
    }

    fn destroy_library(&self) {
        let mut state = self.lock();
        if !state.initialized {
            state.violation("destroy_library called before init".to_string());
        }
        if !state.documents.is_empty() {
            let open = state.documents.len();
            state.violation(format!("destroy_library with {open} open documents"));
        }
        state.initialized = false;
        state.stats.destroy_calls += 1;
    }

    fn last_error(&self) -> u64 {
        self.lock().last_error
    }

    fn load_document(&self, path: &str, password: Option<&str>) -> Option<RawDocument> {
        let mut state = self.lock();
        state.require_init("load_document");

        let failure = match state.registered.get(path) {
            None => Some(FPDF_ERR_FILE),
            Some(doc) if doc.corrupt => Some(FPDF_ERR_FORMAT),
            Some(doc) if doc.password.is_some() && doc.password.as_deref() != password => {
                Some(FPDF_ERR_PASSWORD)
            }
            Some(_) => None,
        };
        if let Some(code) = failure {
            state.last_error = code;
            let delay = state.failed_load_delay;
            drop(state);
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            return None;
        }

        let doc = state.registered.get(path).cloned()?;
        state.last_error = FPDF_ERR_SUCCESS;
        let handle = state.next_handle();
        state.documents.insert(id(handle), doc);
        RawDocument::from_ptr(handle)
    }

    fn close_document(&self, document: RawDocument) {
        let mut state = self.lock();
        if state.documents.remove(&id(document.as_ptr())).is_none() {
            state.violation("close_document: unknown document".to_string());
        }
        if state.panic_on_close {
            drop(state);
            panic!("close_document failed");
        }
    }

    fn page_count(&self, document: RawDocument) -> i32 {
        let mut state = self.lock();
        match state.document(document, "page_count") {
            Some(doc) => doc
                .page_count_override
                .unwrap_or(doc.pages.len() as i32),
            None => -1,
        }
    }

    fn page_size_by_index(&self, document: RawDocument, index: i32) -> Option<(f64, f64)> {
        let mut state = self.lock();
        let doc = state.document(document, "page_size_by_index")?;
        let page = doc.pages.get(usize::try_from(index).ok()?)?;
        if page.fail_size {
            return None;
        }
        Some((page.width, page.height))
    }

    fn load_page(&self, document: RawDocument, index: i32) -> Option<RawPage> {
        let mut state = self.lock();
        let doc = state.document(document, "load_page")?;
        let page = doc.pages.get(usize::try_from(index).ok()?)?;
        if page.fail_load {
            return None;
        }

        let handle = state.next_handle();
        state.pages.insert(id(handle), page.clone());
        state.stats.page_loads += 1;
        RawPage::from_ptr(handle)
    }

    fn close_page(&self, page: RawPage) {
        let mut state = self.lock();
        if state.pages.remove(&id(page.as_ptr())).is_none() {
            state.violation("close_page: unknown page".to_string());
        }
    }

    unsafe fn create_bitmap(
        &self,
        width: i32,
        height: i32,
        _format: i32,
        first_scan: NonNull<u8>,
        stride: i32,
    ) -> Option<RawBitmap> {
        let mut state = self.lock();
        state.require_init("create_bitmap");
        if state.fail_bitmap_create || width <= 0 || height <= 0 || stride < width * 4 {
            return None;
        }

        let handle = state.next_handle();
        state.bitmaps.insert(
            id(handle),
            FakeBitmap {
                pixels: PixelPtr(first_scan),
                width,
                height,
                stride,
            },
        );
        state.stats.bitmap_creates += 1;
        RawBitmap::from_ptr(handle)
    }

    fn fill_rect(&self, bitmap: RawBitmap, left: i32, top: i32, width: i32, height: i32, color: u32) -> bool {
        let mut state = self.lock();
        let Some(target) = state.bitmaps.get(&id(bitmap.as_ptr())) else {
            state.violation("fill_rect: unknown bitmap".to_string());
            return false;
        };
        if state.fail_fill {
            return false;
        }
        paint(target, left, top, width, height, color.to_le_bytes());
        true
    }

    fn render_page_bitmap(
        &self,
        bitmap: RawBitmap,
        page: RawPage,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        _rotate: i32,
        flags: i32,
    ) -> bool {
        let mut state = self.lock();
        state.stats.render_calls += 1;
        state.stats.last_render_flags = Some(flags);

        let Some(source) = state.pages.get(&id(page.as_ptr())).cloned() else {
            state.violation("render_page_bitmap: unknown page".to_string());
            return false;
        };
        let Some(target) = state.bitmaps.get(&id(bitmap.as_ptr())) else {
            state.violation("render_page_bitmap: unknown bitmap".to_string());
            return false;
        };
        if state.fail_render {
            return false;
        }
        if let Some(bgra) = source.paint {
            paint(target, start_x, start_y, size_x, size_y, bgra);
        }
        true
    }

    fn destroy_bitmap(&self, bitmap: RawBitmap) {
        let mut state = self.lock();
        if state.bitmaps.remove(&id(bitmap.as_ptr())).is_none() {
            state.violation("destroy_bitmap: unknown bitmap".to_string());
        }
    }

    fn annotation_count(&self, page: RawPage) -> i32 {
        let mut state = self.lock();
        match state.pages.get(&id(page.as_ptr())) {
            Some(page) => page.annotations.len() as i32,
            None => {
                state.violation("annotation_count: unknown page".to_string());
                0
            }
        }
    }

    fn annotation(&self, page: RawPage, index: i32) -> Option<RawAnnotation> {
        let mut state = self.lock();
        let annotation = state
            .pages
            .get(&id(page.as_ptr()))?
            .annotations
            .get(usize::try_from(index).ok()?)?
            .clone();

        let handle = state.next_handle();
        state.annotations.insert(id(handle), annotation);
        state.stats.annotation_opens += 1;
        RawAnnotation::from_ptr(handle)
    }

    fn close_annotation(&self, annotation: RawAnnotation) {
        let mut state = self.lock();
        let owner = id(annotation.as_ptr());
        if state.annotations.remove(&owner).is_none() {
            state.violation("close_annotation: unknown annotation".to_string());
        }
        state.borrowed.retain(|_, (lender, _)| *lender != owner);
    }

    fn annotation_subtype(&self, annotation: RawAnnotation) -> i32 {
        let state = self.lock();
        state
            .annotations
            .get(&id(annotation.as_ptr()))
            .map_or(0, |a| a.subtype)
    }

    fn annotation_rect(&self, annotation: RawAnnotation) -> Option<PageRect> {
        let state = self.lock();
        state.annotations.get(&id(annotation.as_ptr()))?.rect
    }

    fn annotation_link(&self, annotation: RawAnnotation) -> Option<RawLink> {
        let mut state = self.lock();
        let owner = id(annotation.as_ptr());
        let annotation = state.annotations.get(&owner)?.clone();
        if annotation.subtype != FPDF_ANNOT_LINK {
            return None;
        }
        RawLink::from_ptr(state.lend(owner, Borrowed::Link(annotation)))
    }

    fn link_action(&self, link: RawLink) -> Option<RawAction> {
        let mut state = self.lock();
        let action = match state.borrowed(link.as_ptr(), "link_action")? {
            Borrowed::Link(annotation) => annotation.action.clone()?,
            _ => return None,
        };
        let owner = state.owner(link.as_ptr())?;
        RawAction::from_ptr(state.lend(owner, Borrowed::Action(action)))
    }

    fn link_dest(&self, document: RawDocument, link: RawLink) -> Option<RawDest> {
        let mut state = self.lock();
        state.document(document, "link_dest")?;
        let dest = match state.borrowed(link.as_ptr(), "link_dest")? {
            Borrowed::Link(annotation) => annotation.dest?,
            _ => return None,
        };
        let owner = state.owner(link.as_ptr())?;
        RawDest::from_ptr(state.lend(owner, Borrowed::Dest(dest)))
    }

    fn action_type(&self, action: RawAction) -> u64 {
        let mut state = self.lock();
        match state.borrowed(action.as_ptr(), "action_type") {
            Some(Borrowed::Action(action)) => action.kind,
            _ => 0,
        }
    }

    fn action_dest(&self, document: RawDocument, action: RawAction) -> Option<RawDest> {
        let mut state = self.lock();
        state.document(document, "action_dest")?;
        let dest = match state.borrowed(action.as_ptr(), "action_dest")? {
            Borrowed::Action(action) => action.dest?,
            _ => return None,
        };
        let owner = state.owner(action.as_ptr())?;
        RawDest::from_ptr(state.lend(owner, Borrowed::Dest(dest)))
    }

    fn action_uri_path(&self, document: RawDocument, action: RawAction, buffer: &mut [u8]) -> usize {
        let mut state = self.lock();
        if state.document(document, "action_uri_path").is_none() {
            return 0;
        }
        let uri = match state.borrowed(action.as_ptr(), "action_uri_path") {
            Some(Borrowed::Action(action)) if action.kind == PDFACTION_URI => action.uri.clone(),
            _ => return 0,
        };

        let len = uri.len() + 1;
        if buffer.len() >= len {
            buffer[..uri.len()].copy_from_slice(&uri);
            buffer[uri.len()] = 0;
        }
        len
    }

    fn dest_page_index(&self, document: RawDocument, dest: RawDest) -> i32 {
        let mut state = self.lock();
        if state.document(document, "dest_page_index").is_none() {
            return -1;
        }
        match state.borrowed(dest.as_ptr(), "dest_page_index") {
            Some(Borrowed::Dest(index)) => *index,
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_protocol() {
        let engine = FakeEngine::new();
        engine.add_document("/p.pdf", FakeDocument::new().with_password("pw"));
        engine.init_library();

        assert!(engine.load_document("/p.pdf", None).is_none());
        assert_eq!(engine.last_error(), FPDF_ERR_PASSWORD);
        assert!(engine.load_document("/p.pdf", Some("nope")).is_none());
        assert_eq!(engine.last_error(), FPDF_ERR_PASSWORD);

        let doc = engine.load_document("/p.pdf", Some("pw")).unwrap();
        assert_eq!(engine.last_error(), FPDF_ERR_SUCCESS);
        engine.close_document(doc);
        engine.destroy_library();

        assert!(engine.stats().violations.is_empty());
    }

    #[test]
    fn test_misuse_is_recorded() {
        let engine = FakeEngine::new();
        engine.add_document("/a.pdf", FakeDocument::new());

        let doc = engine.load_document("/a.pdf", None).unwrap();
        engine.close_document(doc);
        engine.close_document(doc);

        let violations = engine.stats().violations;
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("before init"));
        assert!(violations[1].contains("unknown document"));
    }

    #[test]
    fn test_uri_two_call_protocol() {
        let engine = FakeEngine::new();
        let rect = PageRect::new(0.0, 1.0, 1.0, 0.0);
        engine.add_document(
            "/l.pdf",
            FakeDocument::new().with_page(
                FakePage::letter()
                    .with_annotation(FakeAnnotation::link(rect).with_action(FakeAction::uri("abc"))),
            ),
        );
        engine.init_library();
        let doc = engine.load_document("/l.pdf", None).unwrap();
        let page = engine.load_page(doc, 0).unwrap();
        let annot = engine.annotation(page, 0).unwrap();
        let link = engine.annotation_link(annot).unwrap();
        let action = engine.link_action(link).unwrap();

        assert_eq!(engine.action_uri_path(doc, action, &mut []), 4);
        let mut small = [0xEEu8; 2];
        assert_eq!(engine.action_uri_path(doc, action, &mut small), 4);
        assert_eq!(small, [0xEE, 0xEE]);
        let mut buffer = [0u8; 4];
        assert_eq!(engine.action_uri_path(doc, action, &mut buffer), 4);
        assert_eq!(&buffer, b"abc\0");

        assert_eq!(engine.stats().borrowed_handles, 2);
        engine.close_annotation(annot);
        assert_eq!(engine.stats().borrowed_handles, 0);
        // Borrowed handles die with their annotation.
        assert_eq!(engine.action_type(action), 0);
        engine.close_page(page);
        engine.close_document(doc);

        let violations = engine.stats().violations;
        assert_eq!(violations, vec!["action_type: unknown handle".to_string()]);
    }
}
