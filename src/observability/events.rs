//! Observable engine events
//!
//! Events are explicit and typed. Each one has a stable name and a fixed
//! severity so log consumers can filter without parsing messages.

use std::fmt;

use super::Severity;

/// Observable events in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,
    /// A connection's capability descriptor was rejected
    CapabilityRejected,

    // Query pipeline
    /// Graph document loaded
    GraphLoaded,
    /// Path enumeration stopped at a bound
    PathsTruncated,
    /// MSMDC could not discriminate every alternate
    MsmdcAmbiguous,
    /// MSMDC produced a discriminating set
    MsmdcResolved,
    /// Constraint compiled to a provider query
    QueryCompiled,
    /// Compiled query carries a documented approximation
    QueryApproximated,
    /// Edge query plan complete
    EdgePlanned,

    // Slice store
    /// Slice record appended
    SliceAppended,
    /// Persisted slice record failed validation and was excluded
    SliceRecordCorrupt,
    /// Slice store replayed from disk
    SliceStoreOpened,
    /// Connector signature differs from the compiled query
    SignatureMismatch,
    /// Selector chose a series
    SeriesSelected,
    /// MECE member days missing
    MeceIncomplete,

    // Composition
    /// conditional_p branch activated by analysis constraints
    BranchActivated,
    /// conditional_p branch uses an unsupported construct
    BranchUnsupported,
    /// Evidence day skipped
    EvidenceDaySkipped,
    /// Edge composition complete
    EdgeComposed,
}

impl Event {
    /// Returns the stable event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CapabilityRejected => "CAPABILITY_REJECTED",
            Event::GraphLoaded => "GRAPH_LOADED",
            Event::PathsTruncated => "PATHS_TRUNCATED",
            Event::MsmdcAmbiguous => "MSMDC_AMBIGUOUS",
            Event::MsmdcResolved => "MSMDC_RESOLVED",
            Event::QueryCompiled => "QUERY_COMPILED",
            Event::QueryApproximated => "QUERY_APPROXIMATED",
            Event::EdgePlanned => "EDGE_PLANNED",
            Event::SliceAppended => "SLICE_APPENDED",
            Event::SliceRecordCorrupt => "SLICE_RECORD_CORRUPT",
            Event::SliceStoreOpened => "SLICE_STORE_OPENED",
            Event::SignatureMismatch => "SIGNATURE_MISMATCH",
            Event::SeriesSelected => "SERIES_SELECTED",
            Event::MeceIncomplete => "MECE_INCOMPLETE",
            Event::BranchActivated => "BRANCH_ACTIVATED",
            Event::BranchUnsupported => "BRANCH_UNSUPPORTED",
            Event::EvidenceDaySkipped => "EVIDENCE_DAY_SKIPPED",
            Event::EdgeComposed => "EDGE_COMPOSED",
        }
    }

    /// Returns the severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryCompiled | Event::SliceAppended | Event::SeriesSelected => Severity::Trace,
            Event::ConfigLoaded
            | Event::GraphLoaded
            | Event::MsmdcResolved
            | Event::EdgePlanned
            | Event::SliceStoreOpened
            | Event::BranchActivated
            | Event::EdgeComposed => Severity::Info,
            Event::PathsTruncated
            | Event::MsmdcAmbiguous
            | Event::QueryApproximated
            | Event::SignatureMismatch
            | Event::MeceIncomplete
            | Event::BranchUnsupported
            | Event::EvidenceDaySkipped => Severity::Warn,
            Event::CapabilityRejected | Event::SliceRecordCorrupt => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        for event in [Event::MsmdcAmbiguous, Event::SliceRecordCorrupt, Event::BranchUnsupported] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_corruption_is_error() {
        assert_eq!(Event::SliceRecordCorrupt.severity(), Severity::Error);
        assert_eq!(Event::MsmdcAmbiguous.severity(), Severity::Warn);
    }
}
