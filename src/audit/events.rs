//! Audit event types and emission functions.

use crate::core::{EngineHealth, InspectionOutcome};
use crate::policy::{Disposition, PolicyMode};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit record for one finished inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Outcome id.
    pub inspection_id: String,

    /// Engine that performed the scan.
    pub engine: String,

    /// `clean`, `detected` or `unavailable`.
    pub verdict: String,

    /// Signature name of a detection.
    pub signature: Option<String>,

    /// Why the scan could not complete.
    pub failure: Option<String>,

    /// Hex digest of the body.
    pub digest: String,

    /// Engine calls made.
    pub attempts: u32,

    /// Inspection duration in milliseconds.
    pub duration_ms: u64,
}

impl InspectionAuditEvent {
    /// Builds the audit record for an outcome.
    pub fn from_outcome(engine: &str, outcome: &InspectionOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            inspection_id: outcome.id().to_string(),
            engine: engine.to_string(),
            verdict: outcome.verdict().as_str().to_string(),
            signature: outcome.signature().map(str::to_string),
            failure: outcome.failure().map(|f| f.to_string()),
            digest: outcome.digest().to_string(),
            attempts: outcome.attempts(),
            duration_ms: outcome.elapsed().as_millis() as u64,
        }
    }
}

impl AuditEvent for InspectionAuditEvent {
    fn event_type(&self) -> &'static str {
        "inspection_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit record for the interceptor's decision on a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Outcome id.
    pub inspection_id: String,

    /// Middleware instance name.
    pub middleware: String,

    /// `enforce` or `observe`.
    pub mode: String,

    /// `forward` or `reject`.
    pub action: String,

    /// HTTP status written when rejected.
    pub status: Option<u16>,
}

impl AuditEvent for RequestAuditEvent {
    fn event_type(&self) -> &'static str {
        "request_decision"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a finished inspection.
pub fn emit_inspection_completed(engine: &str, outcome: &InspectionOutcome) {
    let event = InspectionAuditEvent::from_outcome(engine, outcome);

    tracing::info!(
        target: "clamgate::audit",
        event_type = event.event_type(),
        inspection_id = %event.inspection_id,
        engine = %event.engine,
        verdict = %event.verdict,
        signature = ?event.signature,
        failure = ?event.failure,
        digest = %event.digest,
        attempts = event.attempts,
        duration_ms = event.duration_ms,
        "Inspection completed"
    );
}

/// Emits an audit event for the interceptor's decision.
pub fn emit_request_decision(
    middleware: &str,
    mode: PolicyMode,
    outcome: &InspectionOutcome,
    disposition: &Disposition,
) {
    let event = RequestAuditEvent {
        timestamp: Utc::now(),
        inspection_id: outcome.id().to_string(),
        middleware: middleware.to_string(),
        mode: mode.to_string(),
        action: disposition.action().to_string(),
        status: disposition.status().map(|s| s.as_u16()),
    };

    tracing::info!(
        target: "clamgate::audit",
        event_type = event.event_type(),
        inspection_id = %event.inspection_id,
        middleware = %event.middleware,
        mode = %event.mode,
        action = %event.action,
        status = ?event.status,
        "Request decision made"
    );
}

/// Emits an audit event with the engine statistics read at startup.
pub fn emit_engine_health(engine: &str, health: &EngineHealth) {
    tracing::info!(
        target: "clamgate::audit",
        event_type = "engine_health",
        engine = %engine,
        threads_idle = health.threads_idle,
        threads_live = health.threads_live,
        threads_max = health.threads_max,
        queue_items = health.queue_items,
        mem_free_mb = ?health.mem_free_mb,
        mem_used_mb = ?health.mem_used_mb,
        "Engine stats"
    );
}
