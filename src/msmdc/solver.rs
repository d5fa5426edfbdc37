//! Greedy minimal discriminating constraint solver
//!
//! Set cover over literals: `visited(n)` for n on the target but not on an
//! alternate, `exclude(n)` for n on an alternate but not on the target. A
//! literal "covers" an alternate when the alternate violates it.
//!
//! Each round selects the literal covering the most uncovered alternates.
//! Ties prefer exclude when the connection excludes natively, then the
//! lowest node id. Afterwards literals are revisited in reverse
//! selection order and dropped if the rest still cover everything, so no
//! single literal in the result is removable.
//!
//! The greedy result is minimal only locally; it is not a minimum cover.

use std::collections::BTreeSet;

use serde::Serialize;

use super::errors::{MsmdcError, MsmdcResult, AMBIGUOUS_PATH_CODE};
use super::literal::Literal;
use crate::dsl::{Constraint, NodeId};
use crate::graph::Path;
use crate::observability::{log_event_with_fields, Event};

/// Why some alternates remain valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
    /// Alternate visits exactly the target's nodes (e.g. parallel edges)
    Indistinguishable,
    /// Candidate evaluations exceeded the step budget
    StepBudget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MsmdcStatus {
    Resolved,
    Ambiguous {
        uncovered: Vec<Path>,
        reason: AmbiguityReason,
    },
}

/// Solver result: the chosen literals and whether they discriminate fully
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MsmdcOutcome {
    pub literals: Vec<Literal>,
    pub status: MsmdcStatus,
    pub steps: u64,
}

impl MsmdcOutcome {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.status, MsmdcStatus::Ambiguous { .. })
    }

    /// `DQ_AMBIGUOUS_PATH` when some alternate stays valid
    pub fn warning_code(&self) -> Option<&'static str> {
        self.is_ambiguous().then_some(AMBIGUOUS_PATH_CODE)
    }

    /// The literals as a constraint (visited/exclude clauses only)
    pub fn to_constraint(&self) -> Constraint {
        self.literals
            .iter()
            .fold(Constraint::new(), |c, literal| match literal {
                Literal::Visited(n) => c.with_visited(n.clone()),
                Literal::Exclude(n) => c.with_exclude(n.clone()),
            })
    }
}

/// Greedy MSMDC solver
#[derive(Debug, Clone, Copy)]
pub struct MsmdcSolver {
    prefer_exclude: bool,
    max_steps: u64,
}

impl MsmdcSolver {
    pub fn new(prefer_exclude: bool, max_steps: u64) -> Self {
        Self {
            prefer_exclude,
            max_steps,
        }
    }

    /// Orders two candidates with equal coverage; `Less` means `a` wins.
    ///
    /// Exclusion is ranked first only when the provider excludes natively;
    /// otherwise the lowest node id decides.
    fn tie_break(&self, a: &Literal, b: &Literal) -> std::cmp::Ordering {
        let rank = |l: &Literal| u8::from(self.prefer_exclude && !l.is_exclude());
        rank(a).cmp(&rank(b)).then_with(|| a.node().cmp(b.node()))
    }

    /// Finds literals that keep `target` valid and invalidate every alternate.
    pub fn solve(&self, target: &[NodeId], alternates: &[Path]) -> MsmdcResult<MsmdcOutcome> {
        if target.is_empty() {
            return Err(MsmdcError::EmptyTarget);
        }

        let target_set: BTreeSet<NodeId> = target.iter().cloned().collect();
        let alt_sets: Vec<BTreeSet<NodeId>> = alternates
            .iter()
            .map(|p| p.iter().cloned().collect())
            .collect();

        let (coverable, indistinguishable): (Vec<usize>, Vec<usize>) =
            (0..alt_sets.len()).partition(|&i| alt_sets[i] != target_set);

        let mut candidates: Vec<Literal> = target_set.iter().cloned().map(Literal::Visited).collect();
        let exclusions: BTreeSet<&NodeId> = coverable
            .iter()
            .flat_map(|&i| alt_sets[i].difference(&target_set))
            .collect();
        candidates.extend(exclusions.into_iter().cloned().map(Literal::Exclude));

        let mut uncovered: Vec<usize> = coverable.clone();
        let mut chosen: Vec<Literal> = Vec::new();
        let mut steps: u64 = 0;
        let mut out_of_budget = false;

        'rounds: while !uncovered.is_empty() {
            let mut best: Option<(usize, &Literal)> = None;
            for candidate in &candidates {
                if steps >= self.max_steps {
                    out_of_budget = true;
                    break 'rounds;
                }
                steps += 1;

                let covers = uncovered
                    .iter()
                    .filter(|&&i| candidate.invalidates(&alt_sets[i]))
                    .count();
                if covers == 0 {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((best_covers, best_literal)) => {
                        covers > best_covers
                            || (covers == best_covers
                                && self.tie_break(candidate, best_literal).is_lt())
                    }
                };
                if better {
                    best = Some((covers, candidate));
                }
            }

            // Every coverable alternate has a covering literal, so a round
            // without a pick means nothing was left to cover.
            let Some((_, literal)) = best else { break };
            let literal = literal.clone();
            uncovered.retain(|&i| !literal.invalidates(&alt_sets[i]));
            chosen.push(literal);
        }

        // Local minimality: drop any literal the others make redundant.
        let covered_now: Vec<usize> = coverable
            .iter()
            .copied()
            .filter(|i| !uncovered.contains(i))
            .collect();
        for index in (0..chosen.len()).rev() {
            let redundant = covered_now.iter().all(|&i| {
                chosen
                    .iter()
                    .enumerate()
                    .any(|(j, l)| j != index && l.invalidates(&alt_sets[i]))
            });
            if redundant {
                chosen.remove(index);
            }
        }

        let status = if out_of_budget && !uncovered.is_empty() {
            MsmdcStatus::Ambiguous {
                uncovered: uncovered
                    .iter()
                    .chain(indistinguishable.iter())
                    .map(|&i| alternates[i].clone())
                    .collect(),
                reason: AmbiguityReason::StepBudget,
            }
        } else if !indistinguishable.is_empty() {
            MsmdcStatus::Ambiguous {
                uncovered: indistinguishable
                    .iter()
                    .map(|&i| alternates[i].clone())
                    .collect(),
                reason: AmbiguityReason::Indistinguishable,
            }
        } else {
            MsmdcStatus::Resolved
        };

        let outcome = MsmdcOutcome {
            literals: chosen,
            status,
            steps,
        };
        let rendered = outcome.to_constraint().canonical();
        match &outcome.status {
            MsmdcStatus::Resolved => log_event_with_fields(
                Event::MsmdcResolved,
                &[("literals", &rendered), ("steps", &steps.to_string())],
            ),
            MsmdcStatus::Ambiguous { uncovered, reason } => log_event_with_fields(
                Event::MsmdcAmbiguous,
                &[
                    ("literals", &rendered),
                    ("uncovered", &uncovered.len().to_string()),
                    (
                        "reason",
                        match reason {
                            AmbiguityReason::Indistinguishable => "indistinguishable",
                            AmbiguityReason::StepBudget => "step_budget",
                        },
                    ),
                ],
            ),
        }

        Ok(outcome)
    }
}
