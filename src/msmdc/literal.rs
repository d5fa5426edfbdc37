//! Discriminating literals

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::dsl::NodeId;

/// A single path constraint the solver may add
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "node", rename_all = "snake_case")]
pub enum Literal {
    /// Require `visited(n)`; candidates are nodes on the target only
    Visited(NodeId),
    /// Require `exclude(n)`; candidates are nodes on some alternate only
    Exclude(NodeId),
}

impl Literal {
    pub fn node(&self) -> &NodeId {
        match self {
            Literal::Visited(n) | Literal::Exclude(n) => n,
        }
    }

    pub fn is_exclude(&self) -> bool {
        matches!(self, Literal::Exclude(_))
    }

    /// Returns true if a path with these nodes violates the literal
    pub fn invalidates(&self, path_nodes: &BTreeSet<NodeId>) -> bool {
        match self {
            Literal::Visited(n) => !path_nodes.contains(n),
            Literal::Exclude(n) => path_nodes.contains(n),
        }
    }

    /// Returns true if a path with these nodes satisfies the literal
    pub fn holds(&self, path_nodes: &BTreeSet<NodeId>) -> bool {
        !self.invalidates(path_nodes)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Visited(n) => write!(f, "visited({})", n),
            Literal::Exclude(n) => write!(f, "exclude({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation() {
        let path: BTreeSet<NodeId> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert!(Literal::Exclude("b".into()).invalidates(&path));
        assert!(!Literal::Exclude("c".into()).invalidates(&path));
        assert!(Literal::Visited("c".into()).invalidates(&path));
        assert!(Literal::Visited("a".into()).holds(&path));
    }

    #[test]
    fn test_display() {
        assert_eq!(Literal::Exclude("x".into()).to_string(), "exclude(x)");
    }
}
