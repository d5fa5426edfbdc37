//! MSMDC Invariant Tests
//!
//! Tests for invariants, checked over a family of generated DAGs:
//! - Soundness: the target path satisfies every chosen literal
//! - Discrimination: a resolved result invalidates every alternate
//! - Local minimality: no single literal can be dropped
//! - Determinism: identical inputs give identical literal sets

use std::collections::BTreeSet;

use dagquery::budget::SearchBudget;
use dagquery::dsl::NodeId;
use dagquery::graph::{enumerate_paths, Edge, Graph, Node, Path};
use dagquery::msmdc::{AmbiguityReason, Literal, MsmdcSolver, MsmdcStatus};

// =============================================================================
// Test Utilities
// =============================================================================

/// Deterministic DAG: edge i→j (i < j) present when the LCG says so
fn generated_graph(seed: u64, nodes: usize) -> Graph {
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) % 100
    };

    let ids: Vec<String> = (0..nodes).map(|i| format!("n{}", i)).collect();
    let mut edges = Vec::new();
    for i in 0..nodes {
        for j in (i + 1)..nodes {
            if j == i + 1 || next() < 35 {
                edges.push(Edge::new(format!("{}-{}", ids[i], ids[j]), ids[i].clone(), ids[j].clone()));
            }
        }
    }
    Graph::new(ids.iter().map(|id| Node::new(id.clone())).collect(), edges).unwrap()
}

fn node_set(path: &[NodeId]) -> BTreeSet<NodeId> {
    path.iter().cloned().collect()
}

fn covers_all(literals: &[Literal], alternates: &[Path]) -> bool {
    alternates
        .iter()
        .all(|alt| literals.iter().any(|l| l.invalidates(&node_set(alt))))
}

// =============================================================================
// Soundness, Discrimination, Minimality
// =============================================================================

#[test]
fn test_solver_invariants_over_generated_graphs() {
    let budget = SearchBudget::new(256, 12, 1_000_000);
    let mut checked = 0;

    for seed in 1..=12u64 {
        let graph = generated_graph(seed, 7);
        for edge in graph.edges() {
            let target: Path = vec![edge.from.clone(), edge.to.clone()];
            let enumeration = enumerate_paths(&graph, &edge.from, &edge.to, &budget).unwrap();
            assert!(!enumeration.truncated);
            let alternates: Vec<Path> = enumeration.alternates(&target).cloned().collect();

            for prefer_exclude in [true, false] {
                let outcome = MsmdcSolver::new(prefer_exclude, budget.max_steps)
                    .solve(&target, &alternates)
                    .unwrap();

                let target_nodes = node_set(&target);
                for literal in &outcome.literals {
                    assert!(literal.holds(&target_nodes), "{} excludes the target", literal);
                }

                assert_eq!(outcome.status, MsmdcStatus::Resolved);
                assert!(covers_all(&outcome.literals, &alternates));

                for skip in 0..outcome.literals.len() {
                    let rest: Vec<Literal> = outcome
                        .literals
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != skip)
                        .map(|(_, l)| l.clone())
                        .collect();
                    assert!(
                        !covers_all(&rest, &alternates),
                        "literal {} is removable",
                        outcome.literals[skip]
                    );
                }
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}

/// A direct edge can only differ from a detour by the detour's nodes.
#[test]
fn test_direct_edge_needs_only_excludes() {
    let graph = generated_graph(7, 6);
    let budget = SearchBudget::default();
    for edge in graph.edges() {
        let target: Path = vec![edge.from.clone(), edge.to.clone()];
        let enumeration = enumerate_paths(&graph, &edge.from, &edge.to, &budget).unwrap();
        let alternates: Vec<Path> = enumeration.alternates(&target).cloned().collect();
        let outcome = MsmdcSolver::new(false, budget.max_steps)
            .solve(&target, &alternates)
            .unwrap();
        assert!(outcome.literals.iter().all(Literal::is_exclude));
    }
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_solver_is_deterministic() {
    let target: Path = vec!["a".into(), "d".into()];
    let alternates: Vec<Path> = vec![
        vec!["a".into(), "c".into(), "d".into()],
        vec!["a".into(), "b".into(), "d".into()],
        vec!["a".into(), "b".into(), "c".into(), "d".into()],
    ];
    let first = MsmdcSolver::new(true, 10_000).solve(&target, &alternates).unwrap();
    for _ in 0..5 {
        let again = MsmdcSolver::new(true, 10_000).solve(&target, &alternates).unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(
        first.literals,
        vec![Literal::Exclude("b".into()), Literal::Exclude("c".into())]
    );
}

// =============================================================================
// Explicit Ambiguity
// =============================================================================

#[test]
fn test_indistinguishable_alternate_is_ambiguous() {
    let target: Path = vec!["a".into(), "b".into()];
    let outcome = MsmdcSolver::new(true, 10_000)
        .solve(&target, &[target.clone()])
        .unwrap();
    match outcome.status {
        MsmdcStatus::Ambiguous { reason, ref uncovered } => {
            assert_eq!(reason, AmbiguityReason::Indistinguishable);
            assert_eq!(*uncovered, vec![target]);
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }
    assert_eq!(outcome.warning_code(), Some("DQ_AMBIGUOUS_PATH"));
}

#[test]
fn test_step_budget_yields_ambiguity_not_hang() {
    let target: Path = vec!["a".into(), "z".into()];
    let alternates: Vec<Path> = (0..50)
        .map(|i| vec!["a".to_string(), format!("m{}", i), "z".to_string()])
        .collect();
    let outcome = MsmdcSolver::new(true, 10).solve(&target, &alternates).unwrap();
    assert!(matches!(
        outcome.status,
        MsmdcStatus::Ambiguous {
            reason: AmbiguityReason::StepBudget,
            ..
        }
    ));
}
