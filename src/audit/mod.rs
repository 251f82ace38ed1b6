//! Structured audit logging.
//!
//! Audit events are emitted through `tracing` under the `clamgate::audit`
//! target, so any subscriber (JSON to stdout, a file appender, OpenTelemetry)
//! can route them separately from operational logs.

mod events;

pub use events::{
    emit_engine_health, emit_inspection_completed, emit_request_decision, AuditEvent,
    InspectionAuditEvent, RequestAuditEvent,
};
