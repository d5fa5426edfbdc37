//! Per-edge evidence and forecast composition
//!
//! Evidence comes from the cohort series: k over the resolved denominator,
//! per cohort day. The forecast is the asymptotic conversion rate p∞
//! estimated from the window series, adjusted for the latency tail. Each
//! cohort day blends its observed k with the forecast for the share of
//! conversions not yet landed:
//!
//! ```text
//! blended = (k + (1 − c)·n·p∞) / n        c = completeness at the day's age
//! ```

use chrono::NaiveDate;
use serde::Serialize;

use super::errors::{ComposeError, ComposeResult};
use super::latency::LatencyModel;
use super::whatif::{activate_branches, BranchDecision};
use crate::dsl::{Constraint, SliceMode};
use crate::graph::Edge;
use crate::observability::{log_event_with_fields, Event};
use crate::slices::ReconciledSeries;

/// Inputs for one edge
#[derive(Debug, Clone, Copy)]
pub struct ComposeRequest<'a> {
    pub edge: &'a Edge,
    /// Evidence series (cohort mode)
    pub cohort: Option<&'a ReconciledSeries>,
    /// Forecast series (window mode)
    pub window: Option<&'a ReconciledSeries>,
    /// Without a model every day counts as complete
    pub latency: Option<LatencyModel>,
    /// Ages are measured to this date
    pub as_of: NaiveDate,
    /// Asserted analysis constraints; the only way a branch applies
    pub what_if: Option<&'a Constraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayComposition {
    pub day: NaiveDate,
    pub n: u64,
    pub k: u64,
    pub age_days: i64,
    pub completeness: f64,
    pub evidence: f64,
    pub blended: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilitySource {
    Evidence,
    Nominal,
    Branch,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeComposition {
    pub edge_id: String,
    pub days: Vec<DayComposition>,
    pub skipped_days: Vec<NaiveDate>,
    /// p∞ from the window series
    pub forecast_p: Option<f64>,
    /// Σk / Σn over composed days
    pub evidence_p: Option<f64>,
    /// Σ blended numerators / Σn over composed days
    pub blended_p: Option<f64>,
    pub nominal_p: Option<f64>,
    pub effective_p: Option<f64>,
    pub source: ProbabilitySource,
    pub branches: Vec<BranchDecision>,
}

pub struct EdgeComposer;

impl EdgeComposer {
    pub fn compose(request: &ComposeRequest<'_>) -> ComposeResult<EdgeComposition> {
        let edge = request.edge;
        check_mode(request.cohort, SliceMode::Cohort)?;
        check_mode(request.window, SliceMode::Window)?;
        if let (Some(cohort), Some(window)) = (request.cohort, request.window) {
            if cohort.param_id != window.param_id {
                return Err(ComposeError::ParamMismatch {
                    evidence: cohort.param_id.clone(),
                    forecast: window.param_id.clone(),
                });
            }
        }

        let completeness = |age: i64| match &request.latency {
            Some(model) => model.completeness(age as f64),
            None => 1.0,
        };

        let forecast_p = request
            .window
            .and_then(|w| forecast(w, request.latency.as_ref(), request.as_of));

        let mut days = Vec::new();
        let mut skipped_days = Vec::new();
        if let Some(cohort) = request.cohort {
            for (day, counts) in &cohort.days {
                let age_days = (request.as_of - *day).num_days();
                let reason = if age_days < 0 {
                    Some("after as_of")
                } else if counts.n == 0 {
                    Some("zero denominator")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    log_event_with_fields(
                        Event::EvidenceDaySkipped,
                        &[
                            ("edge", edge.id.as_str()),
                            ("day", day.to_string().as_str()),
                            ("reason", reason),
                        ],
                    );
                    skipped_days.push(*day);
                    continue;
                }

                let n = counts.n as f64;
                let k = counts.k as f64;
                let c = completeness(age_days);
                let blended = match forecast_p {
                    Some(f) => ((k + (1.0 - c) * n * f) / n).clamp(0.0, 1.0),
                    None => k / n,
                };
                days.push(DayComposition {
                    day: *day,
                    n: counts.n,
                    k: counts.k,
                    age_days,
                    completeness: c,
                    evidence: k / n,
                    blended,
                });
            }
        }

        let total_n: f64 = days.iter().map(|d| d.n as f64).sum();
        let (evidence_p, blended_p) = if total_n > 0.0 {
            let total_k: f64 = days.iter().map(|d| d.k as f64).sum();
            let blended_k: f64 = days.iter().map(|d| d.blended * d.n as f64).sum();
            (Some(total_k / total_n), Some(blended_k / total_n))
        } else {
            (None, None)
        };

        let nominal_p = edge.p.as_ref().map(|p| p.mean);
        let branches = activate_branches(edge, request.what_if);
        let active = branches.iter().find(|b| b.is_active()).map(|b| b.p);

        let (effective_p, source) = match (active, blended_p, nominal_p) {
            (Some(p), _, _) => (Some(p), ProbabilitySource::Branch),
            (None, Some(p), _) => (Some(p), ProbabilitySource::Evidence),
            (None, None, Some(p)) => (Some(p), ProbabilitySource::Nominal),
            (None, None, None) => (None, ProbabilitySource::Unavailable),
        };

        log_event_with_fields(
            Event::EdgeComposed,
            &[
                ("edge", edge.id.as_str()),
                ("days", days.len().to_string().as_str()),
                ("skipped", skipped_days.len().to_string().as_str()),
                (
                    "effective_p",
                    effective_p.map(|p| format!("{:.6}", p)).unwrap_or_default().as_str(),
                ),
            ],
        );

        Ok(EdgeComposition {
            edge_id: edge.id.clone(),
            days,
            skipped_days,
            forecast_p,
            evidence_p,
            blended_p,
            nominal_p,
            effective_p,
            source,
            branches,
        })
    }
}

fn check_mode(series: Option<&ReconciledSeries>, expected: SliceMode) -> ComposeResult<()> {
    match series {
        Some(s) if s.mode != expected => Err(ComposeError::ModeMismatch {
            expected,
            found: s.mode,
        }),
        _ => Ok(()),
    }
}

/// p∞ from window days: Σk/Σn over mature days, else Σk/Σ(n·c) over all
fn forecast(window: &ReconciledSeries, latency: Option<&LatencyModel>, as_of: NaiveDate) -> Option<f64> {
    let aged: Vec<(f64, f64, i64)> = window
        .days
        .iter()
        .map(|(day, c)| (c.n as f64, c.k as f64, (as_of - *day).num_days()))
        .filter(|(n, _, age)| *n > 0.0 && *age >= 0)
        .collect();

    let mature = aged
        .iter()
        .filter(|(_, _, age)| latency.map_or(true, |m| m.is_mature(*age as f64)));
    let (n, k) = mature.fold((0.0_f64, 0.0_f64), |(n, k), (dn, dk, _)| (n + dn, k + dk));
    if n > 0.0 {
        return Some((k / n).clamp(0.0, 1.0));
    }

    let model = latency?;
    let (weighted_n, k) = aged.iter().fold((0.0_f64, 0.0_f64), |(n, k), (dn, dk, age)| {
        (n + dn * model.completeness(*age as f64), k + dk)
    });
    if weighted_n > 0.0 {
        Some((k / weighted_n).clamp(0.0, 1.0))
    } else {
        None
    }
}
