//! Observability for the engine
//!
//! Typed events are emitted through `tracing` with a stable `kind` name and
//! the event fields rendered in deterministic (alphabetical) order.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No effect on computed results
//! 3. One log line = one event
//!
//! # Usage
//!
//! ```ignore
//! use dagquery::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PathsTruncated, &[("from", "a"), ("to", "d")]);
//! ```

mod events;

pub use events::Event;

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-operation detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues surfaced to callers
    Warn = 2,
    /// A record or connection was rejected
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Renders fields as `key=value` pairs sorted by key
pub fn render_fields(fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log an event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log an event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let rendered = render_fields(fields);
    let kind = event.as_str();
    match event.severity() {
        Severity::Trace => tracing::debug!(kind = kind, fields = %rendered),
        Severity::Info => tracing::info!(kind = kind, fields = %rendered),
        Severity::Warn => tracing::warn!(kind = kind, fields = %rendered),
        Severity::Error => tracing::error!(kind = kind, fields = %rendered),
    }
}

/// Installs the process-wide fmt subscriber.
///
/// The filter comes from `DAGQUERY_LOG` (default `info`). Logs go to stderr
/// so stdout stays reserved for JSON responses. Calling this twice is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("DAGQUERY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
