//! Constraint DSL Invariant Tests
//!
//! Tests for invariants:
//! - Canonical form is a fixed point: parse(canonicalize(parse(s))) == parse(s)
//! - Spelling variants of one constraint share one canonical string
//! - Malformed input is an explicit ParseError, never silently dropped
//! - Evaluation covers every clause kind

use dagquery::dsl::{canonicalize, entails, evaluate, parse, EvalState};

// =============================================================================
// Canonical Form
// =============================================================================

const VALID: &[&str] = &[
    "from(a).to(d)",
    "to(d).from(a).exclude(c,b).visited(x)",
    "visitedAny(c,b).visitedAny(e)",
    "context(channel:google).context(device='ios')",
    "contextAny(channel:meta,google)",
    "case(exp:treat).exclude(z)",
    "from(a).to(b).cohort(a,1-Jan-25:31-Jan-25)",
    "from(a).to(b).cohort(-30d:)",
    "from(a).to(b).window(-7d:)",
    "context(campaign:'spring sale')",
    "",
];

#[test]
fn test_canonical_is_fixed_point() {
    for text in VALID {
        let parsed = parse(text).unwrap();
        let canonical = canonicalize(&parsed);
        let reparsed = parse(&canonical).unwrap();
        assert_eq!(reparsed, parsed, "round trip changed '{}'", text);
        assert_eq!(canonicalize(&reparsed), canonical);
    }
}

#[test]
fn test_spellings_share_canonical_form() {
    let a = parse("exclude(c).visited(b).to(d).from(a).exclude(b2)").unwrap();
    let b = parse("from(a).to(d).visited(b).exclude(b2,c)").unwrap();
    assert_eq!(canonicalize(&a), canonicalize(&b));
    assert_eq!(canonicalize(&a), "from(a).to(d).visited(b).exclude(b2,c)");
}

#[test]
fn test_repeated_clauses_accumulate() {
    let c = parse("visited(a).visited(b).visited(a)").unwrap();
    assert_eq!(c.visited.len(), 2);
    assert_eq!(canonicalize(&c), "visited(a,b)");
}

// =============================================================================
// Explicit Failure
// =============================================================================

#[test]
fn test_malformed_input_is_rejected() {
    for text in [
        "visited(a",
        "visited(a))",
        "from(a).minus(b)",
        "from(a).",
        "visited()",
        "from(a).from(b)",
        "cohort(-7d:).window(-7d:)",
        "window(1-Foo-25:)",
    ] {
        let err = parse(text).unwrap_err();
        assert_eq!(err.code(), "DQ_PARSE_ERROR", "accepted '{}'", text);
    }
}

// =============================================================================
// Evaluation
// =============================================================================

#[test]
fn test_evaluate_full_grammar() {
    let c = parse("visited(a).exclude(x).visitedAny(b,c).context(channel:google).case(exp:treat)")
        .unwrap();
    let ok = EvalState::new()
        .with_visited("a")
        .with_visited("b")
        .with_context("channel", "google")
        .with_case("exp", "treat");
    assert!(evaluate(&c, &ok).unwrap());
    assert!(!evaluate(&c, &ok.clone().with_case("exp", "control")).unwrap());
    assert!(!evaluate(&c, &ok.with_visited("x")).unwrap());
}

#[test]
fn test_query_scope_in_condition_is_diagnosed() {
    let condition = parse("visited(a).cohort(-30d:)").unwrap();
    let err = evaluate(&condition, &EvalState::new()).unwrap_err();
    assert_eq!(err.code(), "DQ_UNSUPPORTED_CONDITION_CONSTRUCT");
    assert!(entails(&parse("visited(a)").unwrap(), &condition).is_err());
}
