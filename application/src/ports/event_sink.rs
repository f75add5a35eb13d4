//! Event sink port.
//!
//! The orchestrator emits [`RunEvent`]s through this port; the console
//! reporter renders them and the store appends them to the run's event
//! log. Delivery is at-least-once, so consumers must be idempotent.

use meld_domain::RunEvent;

/// Consumer of the run's ordered event stream.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RunEvent);
}

/// Sink that drops everything (quiet mode, tests).
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &RunEvent) {}
}
