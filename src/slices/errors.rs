//! Slice store error types
//!
//! Error codes:
//! - DQ_SLICE_IO_ERROR (ERROR severity)
//! - DQ_SLICE_WRITE_FAILED (ERROR severity)
//! - DQ_SLICE_INVALID_RECORD (ERROR severity)
//! - DQ_SLICE_NOT_FOUND (WARN severity)
//! - DQ_CONNECTOR_FAILED (WARN severity)

use std::fmt;
use std::io;

/// Severity of a slice error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller can continue with other data
    Warn,
    /// Operation failed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceErrorCode {
    /// Disk I/O failure while opening or reading
    DqSliceIoError,
    /// Append or fsync failed
    DqSliceWriteFailed,
    /// Record fails validation (k > n, empty ids, bad dims)
    DqSliceInvalidRecord,
    /// No series can answer the selection
    DqSliceNotFound,
    /// Connector returned an error or unusable response
    DqConnectorFailed,
}

impl SliceErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            SliceErrorCode::DqSliceIoError => "DQ_SLICE_IO_ERROR",
            SliceErrorCode::DqSliceWriteFailed => "DQ_SLICE_WRITE_FAILED",
            SliceErrorCode::DqSliceInvalidRecord => "DQ_SLICE_INVALID_RECORD",
            SliceErrorCode::DqSliceNotFound => "DQ_SLICE_NOT_FOUND",
            SliceErrorCode::DqConnectorFailed => "DQ_CONNECTOR_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SliceErrorCode::DqSliceNotFound | SliceErrorCode::DqConnectorFailed => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for SliceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Slice error with context
#[derive(Debug)]
pub struct SliceError {
    code: SliceErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl SliceError {
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SliceErrorCode::DqSliceIoError,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SliceErrorCode::DqSliceWriteFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// A lock holder panicked; the index can no longer be trusted
    pub fn poisoned() -> Self {
        Self {
            code: SliceErrorCode::DqSliceIoError,
            message: "slice index lock poisoned".into(),
            details: None,
            source: None,
        }
    }

    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self {
            code: SliceErrorCode::DqSliceInvalidRecord,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn not_found(param_id: &str, message: impl Into<String>) -> Self {
        Self {
            code: SliceErrorCode::DqSliceNotFound,
            message: message.into(),
            details: Some(format!("param_id: {}", param_id)),
            source: None,
        }
    }

    pub fn connector_failed(message: impl Into<String>) -> Self {
        Self {
            code: SliceErrorCode::DqConnectorFailed,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Attaches detail text (e.g. the offending line)
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code(&self) -> SliceErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SliceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type SliceResult<T> = Result<T, SliceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(SliceErrorCode::DqSliceInvalidRecord.code(), "DQ_SLICE_INVALID_RECORD");
        assert_eq!(SliceErrorCode::DqSliceNotFound.severity(), Severity::Warn);
    }

    #[test]
    fn test_display_includes_details() {
        let err = SliceError::not_found("p1", "no series");
        let text = err.to_string();
        assert!(text.contains("DQ_SLICE_NOT_FOUND"));
        assert!(text.contains("param_id: p1"));
    }

    #[test]
    fn test_io_source_preserved() {
        use std::error::Error as _;
        let err = SliceError::write_failed("fsync", io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(err.source().is_some());
        assert_eq!(err.severity(), Severity::Error);
    }
}
