//! Compiler error types
//!
//! Error codes:
//! - DQ_CAPABILITY_MISMATCH: descriptor malformed, rejected or unknown
//! - DQ_UNSUPPORTED_BY_PROVIDER: provider cannot express the constraint
//! - DQ_INVALID_CONSTRAINT: constraint cannot describe any funnel
//! - DQ_TOO_MANY_EXCLUSIONS: inclusion-exclusion expansion too large
//! - DQ_UNKNOWN_NODE: constraint names a node not in the graph

use thiserror::Error;

use crate::graph::GraphError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Capability mismatch for connection '{connection}': {reason}")]
    CapabilityMismatch { connection: String, reason: String },

    #[error("Provider '{provider}' cannot express {construct}")]
    UnsupportedByProvider {
        provider: &'static str,
        construct: String,
    },

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("{count} exclusions exceed the inclusion-exclusion limit of {max}")]
    TooManyExclusions { count: usize, max: usize },

    #[error("Unknown node '{0}'")]
    UnknownNode(String),
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::CapabilityMismatch { .. } => "DQ_CAPABILITY_MISMATCH",
            CompileError::UnsupportedByProvider { .. } => "DQ_UNSUPPORTED_BY_PROVIDER",
            CompileError::InvalidConstraint(_) => "DQ_INVALID_CONSTRAINT",
            CompileError::TooManyExclusions { .. } => "DQ_TOO_MANY_EXCLUSIONS",
            CompileError::UnknownNode(_) => "DQ_UNKNOWN_NODE",
        }
    }

    pub(crate) fn mismatch(connection: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::CapabilityMismatch {
            connection: connection.into(),
            reason: reason.into(),
        }
    }
}

impl From<GraphError> for CompileError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownNode(node) => CompileError::UnknownNode(node),
            other => CompileError::InvalidConstraint(other.to_string()),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
