use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_core::ledger::{verify_chain, AuditFilter, ChainVerification};
use portgate_upstream::AuditLedger;

use crate::error::HandlerError;
use crate::formatter;
use crate::handlers::{Handler, HandlerRequest};

pub const ALGORITHM_TAG: &str = "sha256_hash_chain@v1";
const SOURCE: &str = "ledger_service";

/// Fetches a booking's ledger entries and re-verifies the hash chain locally.
pub struct AuditTrailHandler {
    ledger: Arc<dyn AuditLedger>,
}

impl AuditTrailHandler {
    pub fn new(ledger: Arc<dyn AuditLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Handler for AuditTrailHandler {
    fn name(&self) -> &'static str {
        "audit_trail"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let booking_ref = request
            .entities
            .booking_refs()
            .into_iter()
            .next()
            .ok_or_else(|| HandlerError::missing(EntityKey::BookingRef))?;

        let records = match self.ledger.audit_query(&AuditFilter::for_booking(&booking_ref), caller).await {
            Ok(records) => records,
            Err(error) if error.is_endpoint_missing() => {
                return Ok(formatter::not_available(
                    "blockchain_audit",
                    "not_enabled",
                    "Blockchain audit feature is not yet enabled.",
                    &caller.trace_id,
                ));
            }
            Err(error) => return Err(HandlerError::upstream(SOURCE)(error)),
        };

        let verification = verify_chain(&booking_ref, &records);
        if verification.valid {
            info!(
                event_name = "agent.audit_trail.verified",
                correlation_id = %caller.trace_id,
                entries = verification.verified_entries,
                "ledger chain verified"
            );
        } else {
            warn!(
                event_name = "agent.audit_trail.invalid",
                correlation_id = %caller.trace_id,
                reason = verification.failure_reason.as_deref().unwrap_or_default(),
                "ledger chain failed verification"
            );
        }

        let data = json!({
            "verification": verification,
            "entries": records,
        });
        let provenance = Provenance::new(caller.trace_id.clone(), DataQuality::Primary)
            .with_algorithm(ALGORITHM_TAG)
            .with_source(SOURCE);

        Ok(AgentResult::new(verification_message(&verification), data, provenance))
    }
}

fn verification_message(verification: &ChainVerification) -> String {
    if verification.valid {
        return format!(
            "The audit trail for booking {} is intact: {} ledger entries verified.",
            verification.booking_ref, verification.verified_entries
        );
    }
    format!(
        "The audit trail for booking {} could not be verified: {}.",
        verification.booking_ref,
        verification.failure_reason.as_deref().unwrap_or("unknown failure")
    )
}
