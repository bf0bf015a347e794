//! Error types for pdfium-bridge

use crate::engine::NativeErrorCode;
use thiserror::Error;

/// Result type for pdfium-bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types surfaced by the bridge.
///
/// Every variant maps onto exactly one [`ErrorKind`], the fixed catalog the
/// FFI layer exposes to callers. Native PDFium error codes are embedded in
/// the message wherever the engine reported one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A caller-supplied argument was rejected before reaching the engine.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The document handle is null or already closed.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Page index out of bounds
    #[error("Page index {index} out of bounds (document has {count} pages)")]
    IndexOutOfBounds { index: i32, count: i32 },

    /// The document is encrypted and no password was supplied.
    #[error("Password required (PDFium error code: {code})")]
    PasswordRequired { code: u64 },

    /// The document is encrypted and the supplied password is wrong.
    #[error("Invalid password (PDFium error code: {code})")]
    InvalidPassword { code: u64 },

    /// Failed to open PDF document
    #[error("Failed to open PDF document: {reason}")]
    DocumentOpenFailed { reason: String },

    /// Page load, size query, pixel lock or render failure.
    #[error("IO failure: {reason}")]
    IoFailure { reason: String },

    /// An allocation owned by the bridge could not be satisfied.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
}

impl BridgeError {
    /// Build the error for a failed native open from the engine's last error code.
    pub(crate) fn from_open_failure(code: u64, password_supplied: bool) -> Self {
        match NativeErrorCode::from_raw(code) {
            NativeErrorCode::Password if password_supplied => BridgeError::InvalidPassword { code },
            NativeErrorCode::Password => BridgeError::PasswordRequired { code },
            other => BridgeError::DocumentOpenFailed {
                reason: format!("PDFium error code: {code} ({other})"),
            },
        }
    }

    pub(crate) fn io(reason: impl Into<String>) -> Self {
        BridgeError::IoFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_open() -> Self {
        BridgeError::InvalidState("Document is not valid".to_string())
    }

    /// The catalog entry for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::InvalidState(_) => ErrorKind::InvalidState,
            BridgeError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            BridgeError::PasswordRequired { .. } => ErrorKind::PasswordRequired,
            BridgeError::InvalidPassword { .. } => ErrorKind::InvalidPassword,
            BridgeError::DocumentOpenFailed { .. } => ErrorKind::DocumentOpenFailed,
            BridgeError::IoFailure { .. } => ErrorKind::IoFailure,
            BridgeError::OutOfMemory(_) => ErrorKind::OutOfMemory,
        }
    }
}

/// The fixed error catalog shared with foreign callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    IndexOutOfBounds,
    PasswordRequired,
    InvalidPassword,
    DocumentOpenFailed,
    IoFailure,
    OutOfMemory,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::IndexOutOfBounds => "index out of bounds",
            ErrorKind::PasswordRequired => "password required",
            ErrorKind::InvalidPassword => "invalid password",
            ErrorKind::DocumentOpenFailed => "document open failed",
            ErrorKind::IoFailure => "io failure",
            ErrorKind::OutOfMemory => "out of memory",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FPDF_ERR_FILE, FPDF_ERR_FORMAT, FPDF_ERR_PASSWORD};

    #[test]
    fn test_password_error_without_password() {
        let err = BridgeError::from_open_failure(FPDF_ERR_PASSWORD, false);
        assert_eq!(err, BridgeError::PasswordRequired { code: 4 });
        assert_eq!(err.kind(), ErrorKind::PasswordRequired);
    }

    #[test]
    fn test_password_error_with_password() {
        let err = BridgeError::from_open_failure(FPDF_ERR_PASSWORD, true);
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);
        assert!(err.to_string().contains("error code: 4"));
    }

    #[test]
    fn test_other_codes_embed_native_code() {
        let err = BridgeError::from_open_failure(FPDF_ERR_FILE, true);
        assert_eq!(err.kind(), ErrorKind::DocumentOpenFailed);
        assert!(err.to_string().contains("PDFium error code: 2"));

        let err = BridgeError::from_open_failure(FPDF_ERR_FORMAT, false);
        assert!(err.to_string().contains("PDFium error code: 3"));

        let err = BridgeError::from_open_failure(1234, false);
        assert!(err.to_string().contains("1234"));
    }
}
