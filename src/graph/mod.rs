//! Conversion graph
//!
//! Nodes are conversion steps, edges are transitions carrying a nominal
//! probability, optional `query`/`n_query` strings and conditional
//! branches. Graphs are validated DAGs; every traversal is deterministic.

mod condition;
mod errors;
mod model;
mod paths;

pub use condition::{Condition, ConditionOrigin};
pub use errors::{GraphError, GraphResult};
pub use model::{
    ConditionalBranch, Edge, EdgeAnnotations, EdgeProbability, Graph, GraphDocument, Node,
};
pub use paths::{enumerate_paths, Path, PathEnumeration, TruncationReason};
