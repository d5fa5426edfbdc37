//! Graph error types
//!
//! Error codes:
//! - DQ_GRAPH_INVALID_DOCUMENT
//! - DQ_GRAPH_UNKNOWN_NODE / DQ_GRAPH_UNKNOWN_EDGE
//! - DQ_GRAPH_DUPLICATE_ID
//! - DQ_GRAPH_DANGLING_EDGE
//! - DQ_GRAPH_CYCLE
//! - DQ_GRAPH_INVALID_PROBABILITY
//! - DQ_CONDITION_MIGRATION / DQ_PARSE_ERROR (branch conditions)

use thiserror::Error;

use crate::dsl::DslError;

/// Errors raised while loading or querying a graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Document is not valid JSON or has the wrong shape
    #[error("Invalid graph document: {0}")]
    InvalidDocument(String),

    /// Referenced node does not exist
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    /// Referenced edge does not exist
    #[error("Unknown edge '{0}'")]
    UnknownEdge(String),

    /// Two nodes or two edges share an id
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    /// Edge endpoint is not a node
    #[error("Edge '{edge}' references missing node '{node}'")]
    DanglingEdge { edge: String, node: String },

    /// The graph is not acyclic
    #[error("Graph contains a cycle through node '{node}'")]
    Cycle { node: String },

    /// Probability outside [0, 1]
    #[error("Edge '{edge}' has probability {value} outside [0, 1]")]
    InvalidProbability { edge: String, value: f64 },

    /// A conditional_p condition failed to parse or migrate
    #[error("Edge '{edge}' conditional_p[{index}]: {source}")]
    Condition {
        edge: String,
        index: usize,
        source: DslError,
    },
}

impl GraphError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::InvalidDocument(_) => "DQ_GRAPH_INVALID_DOCUMENT",
            GraphError::UnknownNode(_) => "DQ_GRAPH_UNKNOWN_NODE",
            GraphError::UnknownEdge(_) => "DQ_GRAPH_UNKNOWN_EDGE",
            GraphError::DuplicateId { .. } => "DQ_GRAPH_DUPLICATE_ID",
            GraphError::DanglingEdge { .. } => "DQ_GRAPH_DANGLING_EDGE",
            GraphError::Cycle { .. } => "DQ_GRAPH_CYCLE",
            GraphError::InvalidProbability { .. } => "DQ_GRAPH_INVALID_PROBABILITY",
            GraphError::Condition { source, .. } => source.code(),
        }
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
