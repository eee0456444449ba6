//! Uniform `AgentResult` shapes for outcomes that bypass a handler's own
//! formatting: validation gaps, collaborator outages, denials, and stubs.

use serde_json::json;

use portgate_core::capabilities::allowed_intents;
use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_core::errors::{ApplicationError, DomainError};

use crate::error::HandlerError;

pub const INTERNAL_ERROR_MESSAGE: &str =
    "I encountered an error processing your request. Please try again.";

/// Example value and phrasing offered when an entity is missing.
pub fn entity_hint(field: EntityKey) -> (&'static str, &'static str) {
    match field {
        EntityKey::BookingRef => ("REF123", "Try: 'What is the status of booking REF123?'"),
        EntityKey::CarrierId => ("123", "Try: 'What is the reliability score of carrier 123?'"),
        EntityKey::Terminal => ("A", "Try: 'Show available slots at terminal A tomorrow'"),
        EntityKey::Gate => ("G2", "Try: 'Recommend a slot at terminal A gate 2'"),
        EntityKey::Date => ("2026-03-02", "Try: 'Traffic forecast for 2026-03-02'"),
        EntityKey::Time => ("14:30", "Try: 'Best slot at terminal A at 14:30'"),
        EntityKey::Plate => ("AB-123-CD", "Try: 'Passage history for truck AB-123-CD'"),
    }
}

fn entity_label(field: EntityKey) -> &'static str {
    match field {
        EntityKey::BookingRef => "booking reference",
        EntityKey::CarrierId => "carrier ID",
        EntityKey::Terminal => "terminal",
        EntityKey::Gate => "gate",
        EntityKey::Date => "date",
        EntityKey::Time => "time",
        EntityKey::Plate => "licence plate",
    }
}

pub fn validation_failure(field: EntityKey, trace_id: &str) -> AgentResult {
    let (example, suggestion) = entity_hint(field);
    AgentResult::new(
        format!(
            "I need a {} to answer that (for example `{example}`). {suggestion}",
            entity_label(field)
        ),
        json!({
            "error": "ValidationError",
            "missing_field": field.as_str(),
            "example": example,
            "suggestion": suggestion,
        }),
        Provenance::new(trace_id, DataQuality::Error),
    )
}

pub fn upstream_failure(collaborator: &str, detail: &str, trace_id: &str) -> AgentResult {
    AgentResult::new(
        "The data needed for this request is currently unavailable. Please try again shortly.",
        json!({
            "error": "UpstreamUnavailable",
            "collaborator": collaborator,
            "detail": detail,
        }),
        Provenance::new(trace_id, DataQuality::Unavailable).with_source(collaborator),
    )
}

pub fn internal_failure(trace_id: &str) -> AgentResult {
    AgentResult::new(
        INTERNAL_ERROR_MESSAGE,
        json!({ "error": "InternalError" }),
        Provenance::new(trace_id, DataQuality::Error),
    )
}

/// A supplied entity that no normalizer accepts.
pub fn malformed_entity(error: DomainError, trace_id: &str) -> AgentResult {
    let (field, detail) = match &error {
        DomainError::MalformedEntity { field, detail } => (*field, detail.clone()),
        other => ("entities", other.to_string()),
    };
    AgentResult::new(
        format!("The {field} you supplied is not valid: {detail}."),
        json!({
            "error": "ValidationError",
            "malformed_field": field,
            "detail": detail,
        }),
        Provenance::new(trace_id, DataQuality::Error),
    )
    .with_failure(ApplicationError::Domain(error))
}

pub fn from_handler_error(error: &HandlerError, trace_id: &str) -> AgentResult {
    let result = match error {
        HandlerError::Validation { field } => validation_failure(*field, trace_id),
        HandlerError::Upstream { collaborator, error } => {
            upstream_failure(collaborator, &error.to_string(), trace_id)
        }
        HandlerError::Internal(_) => internal_failure(trace_id),
    };
    result.with_failure(ApplicationError::from(error.clone()))
}

pub fn denied(
    intent: Intent,
    caller: &CallerContext,
    reason_code: &str,
    user_message: &str,
) -> AgentResult {
    let allowed: Vec<&str> =
        allowed_intents(caller.role).into_iter().map(Intent::as_str).collect();
    AgentResult::new(
        user_message,
        json!({
            "error": "AuthorizationDenied",
            "requested_intent": intent.as_str(),
            "user_role": caller.role.as_str(),
            "reason_code": reason_code,
            "allowed_intents": allowed,
        }),
        Provenance::new(caller.trace_id.clone(), DataQuality::NotApplicable),
    )
    .with_failure(ApplicationError::AuthorizationDenied {
        intent: intent.as_str().to_owned(),
        reason: reason_code.to_owned(),
    })
}

/// Answer for features whose collaborator is not deployed.
pub fn not_available(
    feature: &str,
    status: &str,
    message: impl Into<String>,
    trace_id: &str,
) -> AgentResult {
    AgentResult::new(
        message,
        json!({ "status": status, "feature": feature }),
        Provenance::new(trace_id, DataQuality::Unavailable),
    )
}

/// Stamps the pipeline's decision path onto the result.
pub fn finalize(mut result: AgentResult, decision_path: Vec<String>) -> AgentResult {
    result.provenance.decision_path = decision_path;
    result
}

#[cfg(test)]
mod tests {
    use portgate_core::domain::caller::{CallerContext, Role};
    use portgate_core::domain::entity::EntityKey;
    use portgate_core::domain::intent::Intent;
    use portgate_core::domain::result::DataQuality;
    use portgate_core::errors::{ApplicationError, DomainError};
    use portgate_upstream::UpstreamError;

    use super::{denied, finalize, from_handler_error, malformed_entity, validation_failure};
    use crate::error::HandlerError;

    #[test]
    fn validation_failure_names_field_and_example() {
        let result = validation_failure(EntityKey::Terminal, "trace-1");

        assert_eq!(result.data["error"], "ValidationError");
        assert_eq!(result.data["missing_field"], "terminal");
        assert_eq!(result.data["example"], "A");
        assert!(result.message.contains("terminal"));
        assert_eq!(result.data_quality(), DataQuality::Error);
    }

    #[test]
    fn upstream_errors_become_unavailable_results() {
        let error = HandlerError::upstream("slot_service")(UpstreamError::Timeout);
        let result = from_handler_error(&error, "trace-2");

        assert_eq!(result.data["error"], "UpstreamUnavailable");
        assert_eq!(result.data["collaborator"], "slot_service");
        assert_eq!(result.data_quality(), DataQuality::Unavailable);
        assert_eq!(result.provenance.sources, vec!["slot_service".to_owned()]);
        assert!(matches!(result.failure, Some(ApplicationError::Upstream(_))));
    }

    #[test]
    fn malformed_entity_carries_a_domain_failure() {
        let error = DomainError::MalformedEntity {
            field: "carrier_id",
            detail: "expected up to 10 digits".to_owned(),
        };
        let result = malformed_entity(error.clone(), "trace-6");

        assert_eq!(result.data["malformed_field"], "carrier_id");
        assert_eq!(result.failure, Some(ApplicationError::Domain(error)));
    }

    #[test]
    fn internal_errors_hide_details() {
        let result = from_handler_error(&HandlerError::Internal("boom".to_owned()), "trace-3");
        assert!(!result.message.contains("boom"));
        assert_eq!(result.data["error"], "InternalError");
    }

    #[test]
    fn denial_lists_allowed_intents_for_role() {
        let caller = CallerContext::new(Role::Driver, "trace-4");
        let result = denied(Intent::TrafficForecast, &caller, "role_not_permitted", "nope");

        assert_eq!(result.data["requested_intent"], "traffic_forecast");
        assert_eq!(result.data["user_role"], "DRIVER");
        assert_eq!(result.data["allowed_intents"][0], "booking_status");
        assert_eq!(result.provenance.trace_id, "trace-4");
        assert!(matches!(
            result.failure,
            Some(ApplicationError::AuthorizationDenied { ref reason, .. }) if reason == "role_not_permitted"
        ));
    }

    #[test]
    fn finalize_replaces_decision_path() {
        let result = finalize(
            validation_failure(EntityKey::Date, "trace-5"),
            vec!["intent:traffic_forecast".to_owned(), "policy:allow".to_owned()],
        );
        assert_eq!(result.provenance.decision_path.len(), 2);
    }
}
