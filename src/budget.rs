//! Search bounds for CPU-bound operations
//!
//! Path enumeration and MSMDC solving never run unbounded. Exceeding a
//! bound yields a truncated or ambiguous result, never a hang.

use serde::{Deserialize, Serialize};

/// Bounds applied to path enumeration and MSMDC solving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum number of paths returned by one enumeration
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,
    /// Maximum path length in edges
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum DFS visits / greedy candidate evaluations
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
}

fn default_max_paths() -> usize {
    64
}
fn default_max_depth() -> usize {
    12
}
fn default_max_steps() -> u64 {
    100_000
}

impl SearchBudget {
    pub fn new(max_paths: usize, max_depth: usize, max_steps: u64) -> Self {
        Self {
            max_paths,
            max_depth,
            max_steps,
        }
    }

    /// Returns a description of the first zero bound, if any
    pub fn validate(&self) -> Result<(), String> {
        if self.max_paths == 0 {
            return Err("search.max_paths must be > 0".into());
        }
        if self.max_depth == 0 {
            return Err("search.max_depth must be > 0".into());
        }
        if self.max_steps == 0 {
            return Err("search.max_steps must be > 0".into());
        }
        Ok(())
    }
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_paths: default_max_paths(),
            max_depth: default_max_depth(),
            max_steps: default_max_steps(),
        }
    }
}
