//! DSL error types
//!
//! Error codes:
//! - DQ_PARSE_ERROR (REJECT)
//! - DQ_UNSUPPORTED_CONDITION_CONSTRUCT (REJECT, branch treated as inactive)
//! - DQ_CONDITION_MIGRATION (REJECT)

use thiserror::Error;

/// Errors raised while parsing, evaluating or migrating constraint strings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DslError {
    /// Malformed DSL text (unbalanced parens, bad arguments, conflicts)
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A clause name the grammar does not define
    #[error("Unknown function '{name}' at offset {offset}")]
    UnknownFunction { name: String, offset: usize },

    /// A date bound that is neither d-MMM-yy, ISO, nor a relative offset
    #[error("Invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    /// A condition uses a construct the evaluator does not handle
    #[error("Unsupported construct in condition: {construct}")]
    UnsupportedConstruct { construct: String },

    /// A persisted condition has a shape that cannot be migrated
    #[error("Condition migration failed: {0}")]
    Migration(String),
}

impl DslError {
    /// Create a parse error at a byte offset
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        DslError::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Create an unsupported-construct diagnostic
    pub fn unsupported(construct: impl Into<String>) -> Self {
        DslError::UnsupportedConstruct {
            construct: construct.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DslError::Parse { .. } | DslError::UnknownFunction { .. } | DslError::InvalidDate { .. } => {
                "DQ_PARSE_ERROR"
            }
            DslError::UnsupportedConstruct { .. } => "DQ_UNSUPPORTED_CONDITION_CONSTRUCT",
            DslError::Migration(_) => "DQ_CONDITION_MIGRATION",
        }
    }
}

/// Result type for DSL operations
pub type DslResult<T> = Result<T, DslError>;
