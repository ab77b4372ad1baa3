//! Observability: structured logging for recovery runs and churn
//!
//! - Structured logs (JSON lines on stderr)
//! - Deterministic key ordering
//! - Explicit severity levels with a process-wide floor
//! - No async or background threads
//!
//! ```ignore
//! use exhume::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::ScanRecovered, &[("id", "abc123")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log a typed event; warning events go out at WARN, the rest at INFO
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a typed event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a typed event at TRACE level, for per-location detail
pub fn trace_event(event: Event, fields: &[(&str, &str)]) {
    Logger::trace(event.as_str(), fields);
}
