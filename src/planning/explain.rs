//! Explain output for edge plans
//!
//! Deterministic, human-readable rendering of what the planner decided
//! and why.

use std::fmt;

use serde::Serialize;

use super::planner::EdgePlan;
use crate::compiler::{FunnelStep, TermSign};
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct ExplainPlan {
    pub accepted: bool,
    pub edge_id: String,
    pub generated_query: Option<String>,
    /// One line per literal, with the alternates it rules out
    pub literals: Vec<String>,
    /// One line per funnel term
    pub terms: Vec<String>,
    pub approximations: Vec<String>,
    pub denominator: Option<String>,
    pub warnings: Vec<String>,
    pub rejection_code: Option<String>,
    pub rejection_reason: Option<String>,
}

impl ExplainPlan {
    pub fn from_plan(plan: &EdgePlan) -> Self {
        let literals = plan
            .msmdc
            .literals
            .iter()
            .map(|literal| {
                let ruled_out = plan
                    .alternates
                    .iter()
                    .filter(|alt| literal.invalidates(&alt.iter().cloned().collect()))
                    .map(|alt| alt.join(">"))
                    .collect::<Vec<_>>();
                format!("{} rules out [{}]", literal, ruled_out.join(", "))
            })
            .collect();

        let terms = plan
            .provider_query
            .terms
            .iter()
            .map(|term| {
                let sign = match term.sign {
                    TermSign::Plus => "+",
                    TermSign::Minus => "-",
                };
                let steps = term
                    .steps
                    .iter()
                    .map(|step| match step {
                        FunnelStep::Event { node } => node.clone(),
                        FunnelStep::AnyOf { nodes } => format!("any({})", nodes.join("|")),
                    })
                    .collect::<Vec<_>>()
                    .join(" > ");
                if term.segments.is_empty() {
                    format!("{} {}", sign, steps)
                } else {
                    format!("{} {} [{} segment filters]", sign, steps, term.segments.len())
                }
            })
            .collect();

        Self {
            accepted: true,
            edge_id: plan.edge_id.clone(),
            generated_query: Some(plan.generated_query.clone()),
            literals,
            terms,
            approximations: plan
                .provider_query
                .approximations
                .iter()
                .map(|a| a.describe())
                .collect(),
            denominator: plan.denominator.as_ref().map(|d| d.canonical()),
            warnings: plan
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.code, w.message))
                .collect(),
            rejection_code: None,
            rejection_reason: None,
        }
    }

    pub fn from_error(edge_id: &str, error: &EngineError) -> Self {
        Self {
            accepted: false,
            edge_id: edge_id.to_string(),
            generated_query: None,
            literals: Vec::new(),
            terms: Vec::new(),
            approximations: Vec::new(),
            denominator: None,
            warnings: Vec::new(),
            rejection_code: Some(error.code().to_string()),
            rejection_reason: Some(error.to_string()),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EDGE {}", self.edge_id)?;
        if !self.accepted {
            writeln!(
                f,
                "REJECTED {}: {}",
                self.rejection_code.as_deref().unwrap_or("-"),
                self.rejection_reason.as_deref().unwrap_or("-")
            )?;
            return Ok(());
        }
        if let Some(query) = &self.generated_query {
            writeln!(f, "QUERY {}", query)?;
        }
        for literal in &self.literals {
            writeln!(f, "LITERAL {}", literal)?;
        }
        for term in &self.terms {
            writeln!(f, "TERM {}", term)?;
        }
        for approximation in &self.approximations {
            writeln!(f, "APPROX {}", approximation)?;
        }
        if let Some(denominator) = &self.denominator {
            writeln!(f, "DENOMINATOR {}", denominator)?;
        }
        for warning in &self.warnings {
            writeln!(f, "WARN {}", warning)?;
        }
        Ok(())
    }
}
