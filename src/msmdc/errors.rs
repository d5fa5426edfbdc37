//! MSMDC error types
//!
//! Ambiguity is not an error: it is reported on the outcome and the best
//! partial set proceeds. Only malformed input fails.

use thiserror::Error;

/// Warning code attached to ambiguous outcomes
pub const AMBIGUOUS_PATH_CODE: &str = "DQ_AMBIGUOUS_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MsmdcError {
    /// Target path has no nodes
    #[error("MSMDC target path is empty")]
    EmptyTarget,
}

impl MsmdcError {
    pub fn code(&self) -> &'static str {
        match self {
            MsmdcError::EmptyTarget => "DQ_MSMDC_EMPTY_TARGET",
        }
    }
}

pub type MsmdcResult<T> = Result<T, MsmdcError>;
