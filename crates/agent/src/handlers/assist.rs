//! Conversational handlers that need no collaborator: help, smalltalk,
//! clarification for unrecognized messages, and stubs for planned intents.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::json;

use portgate_core::capabilities::allowed_intents;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRequest};

/// A representative phrasing for each answerable intent.
pub fn example_phrase(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::BookingStatus => Some("What is the status of booking REF123?"),
        Intent::CarrierScore => Some("What is the reliability score of carrier 123?"),
        Intent::SlotAvailability => Some("Show available slots at terminal A tomorrow"),
        Intent::SlotRecommendation => Some("Recommend the best slot at terminal A at 14:00"),
        Intent::DriverNoshowRisk => Some("What is the no-show risk for driver AB-123-CD?"),
        Intent::PassageHistory => Some("Show passage history for truck AB-123-CD"),
        Intent::TrafficForecast => Some("Traffic forecast for terminal B today"),
        Intent::AnomalyDetection => Some("Any anomalies detected this week?"),
        Intent::BlockchainAudit => Some("Verify the audit trail for booking REF123"),
        Intent::AnalyticsStressIndex => Some("What is the stress level at terminal A today?"),
        Intent::AnalyticsAlerts => Some("Show proactive alerts for terminal B"),
        Intent::Help | Intent::Smalltalk | Intent::Unknown => None,
    }
}

const CLARIFICATION_SUGGESTIONS: [Intent; 3] =
    [Intent::BookingStatus, Intent::SlotAvailability, Intent::CarrierScore];

pub struct HelpHandler;

#[async_trait]
impl Handler for HelpHandler {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let available: Vec<(Intent, &'static str)> = allowed_intents(caller.role)
            .into_iter()
            .filter_map(|intent| example_phrase(intent).map(|example| (intent, example)))
            .collect();

        let mut message =
            "Hello! I'm your port operations assistant. Here is what I can help you with:".to_owned();
        for (intent, example) in &available {
            let _ = write!(message, "\n• {intent}: \"{example}\"");
        }

        let data = json!({
            "role": caller.role.as_str(),
            "capabilities": available
                .iter()
                .map(|(intent, example)| json!({ "intent": intent.as_str(), "example": example }))
                .collect::<Vec<_>>(),
        });
        Ok(AgentResult::new(
            message,
            data,
            Provenance::new(caller.trace_id.clone(), DataQuality::NotApplicable),
        ))
    }
}

pub struct SmalltalkHandler;

#[async_trait]
impl Handler for SmalltalkHandler {
    fn name(&self) -> &'static str {
        "smalltalk"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        Ok(AgentResult::new(
            "Hello! How can I help with your port operations today? Ask for 'help' to see what I can do.",
            json!({ "status": "ok" }),
            Provenance::new(request.caller.trace_id.clone(), DataQuality::NotApplicable),
        ))
    }
}

/// Fallback for messages no pattern recognized.
pub struct ClarificationHandler;

#[async_trait]
impl Handler for ClarificationHandler {
    fn name(&self) -> &'static str {
        "clarification"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let suggestions: Vec<&'static str> =
            CLARIFICATION_SUGGESTIONS.into_iter().filter_map(example_phrase).collect();

        let mut message = "I'm not sure what you're asking. You could try:".to_owned();
        for suggestion in &suggestions {
            let _ = write!(message, "\n• \"{suggestion}\"");
        }

        Ok(AgentResult::new(
            message,
            json!({ "status": "clarification_needed", "suggestions": suggestions }),
            Provenance::new(request.caller.trace_id.clone(), DataQuality::NotApplicable),
        ))
    }
}

/// Recognized intents with no backing implementation yet.
pub struct PlannedFeatureHandler;

#[async_trait]
impl Handler for PlannedFeatureHandler {
    fn name(&self) -> &'static str {
        "planned_feature"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let intent = request.intent;
        Ok(AgentResult::new(
            format!("The '{intent}' feature is planned but not yet implemented."),
            json!({ "status": "not_implemented", "feature": intent.as_str() }),
            Provenance::new(request.caller.trace_id.clone(), DataQuality::NotApplicable),
        ))
    }
}
