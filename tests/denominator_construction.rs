//! Denominator Construction Tests
//!
//! Tests for invariants:
//! - Cohort denominators are anchor-prefixed exactly once
//! - Window denominators are never anchor-prefixed
//! - Slicing dimensions flow from the edge query into its denominator
//! - Construction errors surface before any query runs

use dagquery::budget::SearchBudget;
use dagquery::compiler::CapabilityRegistry;
use dagquery::context::RequestContext;
use dagquery::denominator::{DenominatorQuery, DenominatorRequest, DenominatorResolver};
use dagquery::dsl::{parse, SliceMode};
use dagquery::graph::{Edge, Graph, Node};
use dagquery::planning::EdgeQueryPlanner;
use serde_json::json;

// =============================================================================
// Test Utilities
// =============================================================================

/// home (entry) → browse → cart → buy, with browse → buy directly
fn graph() -> Graph {
    Graph::new(
        vec![
            Node::entry("home"),
            Node::new("browse"),
            Node::new("cart"),
            Node::new("buy"),
        ],
        vec![
            Edge::new("home-browse", "home", "browse"),
            Edge::new("browse-cart", "browse", "cart"),
            Edge::new("cart-buy", "cart", "buy"),
            Edge::new("browse-buy", "browse", "buy")
                .with_query("from(browse).to(buy).context(channel:google)")
                .with_n_query("to(browse).visited(home)"),
        ],
    )
    .unwrap()
}

fn registry() -> CapabilityRegistry {
    CapabilityRegistry::from_values(&[json!({
        "connectionName": "amp",
        "providerType": "amplitude",
        "supportsNativeExclude": true
    })])
}

fn plan_denominator(graph: &Graph, edge: &str, mode: SliceMode) -> DenominatorQuery {
    let registry = registry();
    let mut ctx = RequestContext::new(SearchBudget::default());
    EdgeQueryPlanner::new(graph, &registry, 30)
        .plan(&mut ctx, edge, "amp", Some(mode))
        .unwrap()
        .denominator
        .unwrap()
}

// =============================================================================
// Planned Denominators
// =============================================================================

#[test]
fn test_cohort_denominator_from_graph_anchor() {
    let graph = graph();
    let q = plan_denominator(&graph, "cart-buy", SliceMode::Cohort);
    assert_eq!(q.anchor(), Some("home"));
    assert_eq!(q.canonical(), "from(home).to(cart)");
}

#[test]
fn test_window_denominator_is_arrivals() {
    let graph = graph();
    let q = plan_denominator(&graph, "cart-buy", SliceMode::Window);
    assert!(q.anchor().is_none());
    assert_eq!(q.canonical(), "to(cart)");
}

#[test]
fn test_n_query_and_segments_carry_over() {
    let graph = graph();
    let q = plan_denominator(&graph, "browse-buy", SliceMode::Cohort);
    assert_eq!(
        q.canonical(),
        "from(home).to(browse).visited(home).context(channel:google)"
    );

    let q = plan_denominator(&graph, "browse-buy", SliceMode::Window);
    assert_eq!(q.canonical(), "to(browse).visited(home).context(channel:google)");
}

#[test]
fn test_no_mode_means_no_denominator() {
    let graph = graph();
    let registry = registry();
    let mut ctx = RequestContext::new(SearchBudget::default());
    let plan = EdgeQueryPlanner::new(&graph, &registry, 30)
        .plan(&mut ctx, "cart-buy", "amp", None)
        .unwrap();
    assert!(plan.mode.is_none());
    assert!(plan.denominator.is_none());
}

#[test]
fn test_query_date_clause_sets_mode() {
    let graph = Graph::new(
        vec![Node::entry("home"), Node::new("cart"), Node::new("buy")],
        vec![
            Edge::new("home-cart", "home", "cart"),
            Edge::new("cart-buy", "cart", "buy").with_query("from(cart).to(buy).cohort(-14d:)"),
        ],
    )
    .unwrap();
    let registry = registry();
    let mut ctx = RequestContext::new(SearchBudget::default());
    let plan = EdgeQueryPlanner::new(&graph, &registry, 30)
        .plan(&mut ctx, "cart-buy", "amp", None)
        .unwrap();
    assert_eq!(plan.mode, Some(SliceMode::Cohort));
    assert_eq!(
        plan.denominator.unwrap().canonical(),
        "from(home).to(cart).cohort(-14d:)"
    );
}

// =============================================================================
// Construction Errors
// =============================================================================

#[test]
fn test_cohort_without_entry_is_rejected() {
    // The only flagged entry sits downstream of the edge.
    let graph = Graph::new(
        vec![Node::new("a"), Node::new("b"), Node::entry("c")],
        vec![Edge::new("a-b", "a", "b"), Edge::new("b-c", "b", "c")],
    )
    .unwrap();
    let registry = registry();
    let mut ctx = RequestContext::new(SearchBudget::default());
    let err = EdgeQueryPlanner::new(&graph, &registry, 30)
        .plan(&mut ctx, "a-b", "amp", Some(SliceMode::Cohort))
        .unwrap_err();
    assert_eq!(err.code(), "DQ_DENOMINATOR_CONSTRUCTION");
}

#[test]
fn test_n_query_must_end_at_from_node() {
    let edge = parse("from(cart).to(buy)").unwrap();
    let n_query = parse("to(buy)").unwrap();
    let err = DenominatorResolver::resolve(&DenominatorRequest {
        mode: SliceMode::Window,
        from_node: "cart",
        edge_query: &edge,
        n_query: Some(&n_query),
        resolved_anchor: None,
    })
    .unwrap_err();
    assert_eq!(err.code(), "DQ_DENOMINATOR_CONSTRUCTION");
}

#[test]
fn test_n_query_anchor_must_agree() {
    let edge = parse("from(cart).to(buy).cohort(-7d:)").unwrap();
    let n_query = parse("from(browse).to(cart)").unwrap();
    let err = DenominatorResolver::resolve(&DenominatorRequest {
        mode: SliceMode::Cohort,
        from_node: "cart",
        edge_query: &edge,
        n_query: Some(&n_query),
        resolved_anchor: Some("home"),
    })
    .unwrap_err();
    assert_eq!(err.code(), "DQ_DENOMINATOR_CONSTRUCTION");

    // Naming the same anchor is not a conflict.
    let n_query = parse("from(home).to(cart)").unwrap();
    let q = DenominatorResolver::resolve(&DenominatorRequest {
        mode: SliceMode::Cohort,
        from_node: "cart",
        edge_query: &edge,
        n_query: Some(&n_query),
        resolved_anchor: Some("home"),
    })
    .unwrap();
    assert_eq!(q.canonical(), "from(home).to(cart).cohort(-7d:)");
}

#[test]
fn test_window_n_query_from_node_is_allowed() {
    let edge = parse("from(cart).to(buy).window(-7d:)").unwrap();
    let n_query = parse("from(cart).to(cart)").unwrap();
    let q = DenominatorResolver::resolve(&DenominatorRequest {
        mode: SliceMode::Window,
        from_node: "cart",
        edge_query: &edge,
        n_query: Some(&n_query),
        resolved_anchor: Some("home"),
    })
    .unwrap();
    assert_eq!(q.canonical(), "to(cart).window(-7d:)");
}
