//! Process-wide document handle table
//!
//! Foreign callers hold `u64` identifiers, never addresses. Identifiers start
//! at 1 and are never reused, so a stale handle cannot alias a newer
//! document. `0` is the null handle.

use once_cell::sync::Lazy;
use pdfium_bridge::Document;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A document shared between the table and in-flight calls.
pub(crate) type SharedDocument = Arc<Mutex<Document>>;

static HANDLES: Lazy<Mutex<HandleTable>> = Lazy::new(|| Mutex::new(HandleTable::default()));

#[derive(Default)]
pub(crate) struct HandleTable {
    last_id: u64,
    documents: HashMap<u64, SharedDocument>,
}

impl HandleTable {
    /// Store a document. Gives it back if the table cannot grow.
    pub(crate) fn insert(&mut self, document: Document) -> Result<u64, Document> {
        if self.documents.try_reserve(1).is_err() {
            return Err(document);
        }
        self.last_id += 1;
        let id = self.last_id;
        self.documents.insert(id, Arc::new(Mutex::new(document)));
        Ok(id)
    }

    pub(crate) fn get(&self, handle: u64) -> Option<SharedDocument> {
        self.documents.get(&handle).cloned()
    }

    pub(crate) fn remove(&mut self, handle: u64) -> Option<SharedDocument> {
        self.documents.remove(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }
}

fn table() -> MutexGuard<'static, HandleTable> {
    HANDLES.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn insert(document: Document) -> Result<u64, Document> {
    table().insert(document)
}

pub(crate) fn get(handle: u64) -> Option<SharedDocument> {
    table().get(handle)
}

pub(crate) fn remove(handle: u64) -> Option<SharedDocument> {
    table().remove(handle)
}

pub(crate) fn open_count() -> usize {
    table().len()
}

/// Lock one document for the duration of a call.
pub(crate) fn lock(document: &SharedDocument) -> MutexGuard<'_, Document> {
    document.lock().unwrap_or_else(PoisonError::into_inner)
}
