use portgate_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use tracing::{info, warn};

/// Writes audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let intent = event.intent.map(|intent| intent.as_str()).unwrap_or("none");
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = "audit.event.recorded",
                correlation_id = %event.correlation_id,
                audit_event_id = %event.event_id,
                audit_type = %event.event_type,
                category = ?event.category,
                outcome = ?event.outcome,
                actor_role = %event.actor_role,
                actor = %event.actor,
                intent,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected | AuditOutcome::Degraded | AuditOutcome::Failed => warn!(
                event_name = "audit.event.recorded",
                correlation_id = %event.correlation_id,
                audit_event_id = %event.event_id,
                audit_type = %event.event_type,
                category = ?event.category,
                outcome = ?event.outcome,
                actor_role = %event.actor_role,
                actor = %event.actor,
                intent,
                metadata = %metadata,
                "audit event"
            ),
        }
    }
}
