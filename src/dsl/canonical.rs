//! Canonical serialization
//!
//! Clause order is fixed: from, to, visited, visitedAny, exclude, context,
//! contextAny, case, window, cohort. Lists and map keys come out sorted
//! because the structure only holds ordered collections. Values outside
//! `[A-Za-z0-9_-]` are quoted.

use super::ast::Constraint;

/// Serializes a constraint to its one canonical string
pub fn canonicalize(constraint: &Constraint) -> String {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(from) = &constraint.from {
        clauses.push(format!("from({})", quote(from)));
    }
    if let Some(to) = &constraint.to {
        clauses.push(format!("to({})", quote(to)));
    }
    if !constraint.visited.is_empty() {
        clauses.push(format!("visited({})", join(constraint.visited.iter())));
    }
    for group in &constraint.visited_any {
        clauses.push(format!("visitedAny({})", join(group.iter())));
    }
    if !constraint.exclude.is_empty() {
        clauses.push(format!("exclude({})", join(constraint.exclude.iter())));
    }
    for (key, value) in &constraint.context {
        clauses.push(format!("context({}:{})", quote(key), quote(value)));
    }
    for (key, values) in &constraint.context_any {
        clauses.push(format!("contextAny({}:{})", quote(key), join(values.iter())));
    }
    for (key, value) in &constraint.case {
        clauses.push(format!("case({}:{})", quote(key), quote(value)));
    }
    if let Some(window) = &constraint.window {
        clauses.push(format!("window({})", window));
    }
    if let Some(cohort) = &constraint.cohort {
        match &cohort.anchor {
            Some(anchor) => clauses.push(format!("cohort({},{})", quote(anchor), cohort.range)),
            None => clauses.push(format!("cohort({})", cohort.range)),
        }
    }

    clauses.join(".")
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(|s| quote(s)).collect::<Vec<_>>().join(",")
}

/// Returns true if the value can be written without quotes
pub(crate) fn is_bare(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn quote(value: &str) -> String {
    if is_bare(value) {
        value.to_string()
    } else if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::dates::{DateBound, DateRange};

    #[test]
    fn test_clause_order() {
        let c = Constraint::funnel("a", "d")
            .with_exclude("c")
            .with_visited("b")
            .with_context("channel", "google");
        assert_eq!(
            canonicalize(&c),
            "from(a).to(d).visited(b).exclude(c).context(channel:google)"
        );
    }

    #[test]
    fn test_quoting() {
        let c = Constraint::new()
            .with_context("campaign", "spring sale")
            .with_case("exp", "it's");
        assert_eq!(
            canonicalize(&c),
            "context(campaign:'spring sale').case(exp:\"it's\")"
        );
    }

    #[test]
    fn test_non_ascii_values_are_quoted() {
        let c = Constraint::new().with_context("city", "café");
        assert_eq!(canonicalize(&c), "context(city:'café')");
        assert_eq!(crate::dsl::parse(&canonicalize(&c)).unwrap(), c);
        assert!(!is_bare("naïve"));
        assert!(is_bare("spring_sale-2"));
    }

    #[test]
    fn test_cohort_with_and_without_anchor() {
        let range = DateRange::new(Some(DateBound::parse("-30d").unwrap()), None).unwrap();
        let anchored = Constraint::new().with_cohort(Some("a".into()), range);
        assert_eq!(canonicalize(&anchored), "cohort(a,-30d:)");
        let bare = Constraint::new().with_cohort(None, range);
        assert_eq!(canonicalize(&bare), "cohort(-30d:)");
    }

    #[test]
    fn test_empty() {
        assert_eq!(canonicalize(&Constraint::new()), "");
    }
}
