//! Composer error types
//!
//! Error codes:
//! - DQ_INVALID_LATENCY: lag parameters cannot define a lognormal
//! - DQ_SERIES_MODE_MISMATCH: a series was passed in the wrong role
//! - DQ_SERIES_PARAM_MISMATCH: evidence and forecast series disagree on parameter

use thiserror::Error;

use crate::dsl::SliceMode;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposeError {
    #[error("Invalid latency: median {median} days, mean {mean} days")]
    InvalidLatency { median: f64, mean: f64 },

    #[error("Expected a {expected} series, got {found}")]
    ModeMismatch { expected: SliceMode, found: SliceMode },

    #[error("Evidence series is for '{evidence}', forecast series for '{forecast}'")]
    ParamMismatch { evidence: String, forecast: String },
}

impl ComposeError {
    pub fn code(&self) -> &'static str {
        match self {
            ComposeError::InvalidLatency { .. } => "DQ_INVALID_LATENCY",
            ComposeError::ModeMismatch { .. } => "DQ_SERIES_MODE_MISMATCH",
            ComposeError::ParamMismatch { .. } => "DQ_SERIES_PARAM_MISMATCH",
        }
    }
}

pub type ComposeResult<T> = Result<T, ComposeError>;
