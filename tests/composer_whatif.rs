//! Evidence Composition and What-If Tests
//!
//! Tests for invariants:
//! - Young cohort days lean on the forecast; mature days on their evidence
//! - Branch probabilities apply only under an entailing What-If assertion
//! - The first entailed branch wins; later ones are shadowed
//! - A condition that cannot be judged is reported, not silently inactive

use chrono::{NaiveDate, TimeZone, Utc};
use dagquery::composer::{
    BranchStatus, ComposeRequest, EdgeComposer, LatencyModel, ProbabilitySource,
};
use dagquery::dsl::{parse, SliceMode};
use dagquery::graph::Graph;
use dagquery::slices::{MemorySliceStore, ReconciledSeries, SliceDims, SliceRecord, SliceSelector, SliceStore};

// =============================================================================
// Test Utilities
// =============================================================================

const GRAPH: &str = r#"{
    "nodes": [
        {"id": "home", "entry": true},
        {"id": "promo"},
        {"id": "cart"},
        {"id": "buy"}
    ],
    "edges": [
        {"id": "home-promo", "from": "home", "to": "promo"},
        {"id": "home-cart", "from": "home", "to": "cart"},
        {"id": "promo-cart", "from": "promo", "to": "cart"},
        {
            "id": "cart-buy", "from": "cart", "to": "buy",
            "p": {"mean": 0.3, "id": "p1"},
            "conditional_p": [
                {"condition": {"visited": ["promo"]}, "p": 0.9},
                {"condition": "visited(promo).context(channel:google)", "p": 0.7},
                {"condition": "visited(promo).cohort(-30d:)", "p": 0.1}
            ]
        }
    ]
}"#;

fn date(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, d).unwrap()
}

fn as_of() -> NaiveDate {
    date(2, 28)
}

fn record(mode: SliceMode, day: NaiveDate, n: u64, k: u64) -> SliceRecord {
    SliceRecord {
        param_id: "p1".into(),
        core_hash: "h1".into(),
        slice_key: String::new(),
        mode,
        day,
        retrieved_at: Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap(),
        n,
        k,
    }
}

/// Window days in early January convert at 0.5; cohort has one young
/// and one mature day.
fn series() -> (ReconciledSeries, ReconciledSeries) {
    let store = MemorySliceStore::new();
    for d in 1..=5 {
        store.append(record(SliceMode::Window, date(1, d), 200, 100)).unwrap();
    }
    store.append(record(SliceMode::Cohort, date(1, 10), 100, 48)).unwrap();
    store.append(record(SliceMode::Cohort, date(2, 27), 100, 10)).unwrap();

    let selector = SliceSelector::new(&store, &[]);
    let cohort = selector
        .select("p1", &SliceDims::none(), SliceMode::Cohort)
        .unwrap();
    let window = selector
        .select("p1", &SliceDims::none(), SliceMode::Window)
        .unwrap();
    (cohort, window)
}

fn latency() -> LatencyModel {
    LatencyModel::from_lags(2.0, 3.0).unwrap()
}

// =============================================================================
// Evidence and Forecast Blending
// =============================================================================

#[test]
fn test_young_days_lean_on_forecast() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let (cohort, window) = series();

    let composition = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: Some(&cohort),
        window: Some(&window),
        latency: Some(latency()),
        as_of: as_of(),
        what_if: None,
    })
    .unwrap();

    assert_eq!(composition.forecast_p, Some(0.5));
    assert_eq!(composition.days.len(), 2);

    let mature = &composition.days[0];
    assert_eq!(mature.age_days, 49);
    assert!(mature.completeness > 0.99);
    assert!((mature.blended - mature.evidence).abs() < 0.01);

    let young = &composition.days[1];
    assert_eq!(young.age_days, 1);
    assert!(young.completeness < 0.5);
    assert!(young.blended > young.evidence + 0.2);
    assert!(young.blended <= 0.5);

    assert_eq!(composition.source, ProbabilitySource::Evidence);
    assert_eq!(composition.effective_p, composition.blended_p);
    assert!((composition.evidence_p.unwrap() - 0.29).abs() < 1e-9);
}

#[test]
fn test_without_latency_evidence_is_final() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let (cohort, window) = series();

    let composition = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: Some(&cohort),
        window: Some(&window),
        latency: None,
        as_of: as_of(),
        what_if: None,
    })
    .unwrap();
    for day in &composition.days {
        assert_eq!(day.completeness, 1.0);
        assert!((day.blended - day.evidence).abs() < 1e-12);
    }
}

#[test]
fn test_nominal_when_no_evidence() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let composition = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: None,
        window: None,
        latency: None,
        as_of: as_of(),
        what_if: None,
    })
    .unwrap();
    assert_eq!(composition.source, ProbabilitySource::Nominal);
    assert_eq!(composition.effective_p, Some(0.3));
}

#[test]
fn test_series_mode_is_checked() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let (cohort, window) = series();
    let err = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: Some(&window),
        window: Some(&cohort),
        latency: None,
        as_of: as_of(),
        what_if: None,
    })
    .unwrap_err();
    assert_eq!(err.code(), "DQ_SERIES_MODE_MISMATCH");
}

// =============================================================================
// What-If Branch Activation
// =============================================================================

#[test]
fn test_branches_inactive_by_default() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let (cohort, window) = series();

    let composition = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: Some(&cohort),
        window: Some(&window),
        latency: Some(latency()),
        as_of: as_of(),
        what_if: None,
    })
    .unwrap();

    let statuses: Vec<&BranchStatus> = composition.branches.iter().map(|b| &b.status).collect();
    assert_eq!(statuses[0], &BranchStatus::Inactive);
    assert_eq!(statuses[1], &BranchStatus::Inactive);
    assert!(matches!(statuses[2], BranchStatus::Unsupported { .. }));
    assert_ne!(composition.source, ProbabilitySource::Branch);
}

#[test]
fn test_first_entailed_branch_wins() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let (cohort, window) = series();
    let what_if = parse("visited(promo).context(channel:google)").unwrap();

    let composition = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: Some(&cohort),
        window: Some(&window),
        latency: Some(latency()),
        as_of: as_of(),
        what_if: Some(&what_if),
    })
    .unwrap();

    assert_eq!(composition.branches[0].condition, "visited(promo)");
    assert_eq!(composition.branches[0].status, BranchStatus::Active);
    assert_eq!(composition.branches[1].status, BranchStatus::Shadowed);
    match &composition.branches[2].status {
        BranchStatus::Unsupported { code, .. } => {
            assert_eq!(*code, "DQ_UNSUPPORTED_CONDITION_CONSTRUCT")
        }
        other => panic!("expected unsupported, got {:?}", other),
    }
    assert_eq!(composition.source, ProbabilitySource::Branch);
    assert_eq!(composition.effective_p, Some(0.9));
}

#[test]
fn test_non_entailing_assertion_keeps_evidence() {
    let graph = Graph::from_json(GRAPH).unwrap();
    let edge = graph.edge("cart-buy").unwrap();
    let (cohort, window) = series();
    // Excluding promo contradicts every branch.
    let what_if = parse("exclude(promo)").unwrap();

    let composition = EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: Some(&cohort),
        window: Some(&window),
        latency: Some(latency()),
        as_of: as_of(),
        what_if: Some(&what_if),
    })
    .unwrap();
    assert!(composition.branches.iter().all(|b| !b.is_active()));
    assert_eq!(composition.source, ProbabilitySource::Evidence);
}

#[test]
fn test_empty_condition_never_loads() {
    // An always-true branch would activate under any What-If.
    for condition in [r#""""#, "{}"] {
        let doc = GRAPH.replace(r#"{"visited": ["promo"]}"#, condition);
        let err = Graph::from_json(&doc).unwrap_err();
        assert_eq!(err.code(), "DQ_CONDITION_MIGRATION", "loaded {}", condition);
    }
}
