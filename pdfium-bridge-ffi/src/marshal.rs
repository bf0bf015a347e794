//! Boundary helpers: status mapping, last-error storage, panic containment
//! and C string conversion.

use crate::PdfbStatus;
use libc::c_char;
use pdfium_bridge::{BridgeError, ErrorKind};
use std::any::Any;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

impl From<ErrorKind> for PdfbStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => PdfbStatus::InvalidArgument,
            ErrorKind::InvalidState => PdfbStatus::InvalidState,
            ErrorKind::IndexOutOfBounds => PdfbStatus::IndexOutOfBounds,
            ErrorKind::PasswordRequired => PdfbStatus::PasswordRequired,
            ErrorKind::InvalidPassword => PdfbStatus::InvalidPassword,
            ErrorKind::DocumentOpenFailed => PdfbStatus::DocumentOpenFailed,
            ErrorKind::IoFailure => PdfbStatus::IoFailure,
            ErrorKind::OutOfMemory => PdfbStatus::OutOfMemory,
        }
    }
}

/// Record `message` as this thread's last error.
pub(crate) fn set_last_error(message: &str) {
    // C strings cannot carry interior NULs.
    let message = CString::new(message.replace('\0', " ")).ok();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = message);
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Copy of this thread's last error message.
pub(crate) fn last_error() -> Option<CString> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Record a bridge error and convert it to a status.
pub(crate) fn fail(call: &str, err: &BridgeError) -> PdfbStatus {
    log::debug!("{call} failed: {err}");
    set_last_error(&err.to_string());
    err.kind().into()
}

/// Record an argument error raised at the boundary itself.
pub(crate) fn invalid_argument(call: &str, message: &str) -> PdfbStatus {
    fail(call, &BridgeError::InvalidArgument(message.to_string()))
}

pub(crate) fn invalid_state(call: &str, message: &str) -> PdfbStatus {
    fail(call, &BridgeError::InvalidState(message.to_string()))
}

/// Run an entry point body, turning a panic into `InternalError`.
pub(crate) fn guarded(call: &str, body: impl FnOnce() -> PdfbStatus) -> PdfbStatus {
    clear_last_error();
    guarded_or(call, PdfbStatus::InternalError, body)
}

/// Run an entry point body, returning `fallback` if it panics.
pub(crate) fn guarded_or<T>(call: &str, fallback: T, body: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            let message = format!("panic in {call}: {}", panic_message(&*payload));
            log::error!("{message}");
            set_last_error(&message);
            fallback
        }
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

/// Borrow a required UTF-8 C string.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn required_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{what} is null"));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("{what} is not valid UTF-8"))
}

/// Borrow an optional UTF-8 C string; null is `None`.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn optional_str<'a>(ptr: *const c_char, what: &str) -> Result<Option<&'a str>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    required_str(ptr, what).map(Some)
}
