//! The request pipeline: classify, resolve, authorize, route, execute, and
//! translate every outcome into an `AgentResult` with a decision path.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use portgate_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use portgate_core::capabilities::chat_entry_permitted;
use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::entity::EntityMap;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_core::errors::ApplicationError;
use portgate_upstream::Collaborators;

use crate::classifier::{Classification, IntentClassifier};
use crate::error::{AgentError, HandlerError};
use crate::formatter;
use crate::handlers::{HandlerRequest, HandlerSettings};
use crate::policy::{PolicyDecision, PolicyEnforcer};
use crate::resolver::{normalize_supplied, EntityResolver};
use crate::router::AgentRouter;

pub const CHAT_NOT_PERMITTED: &str = "chat_not_permitted";

/// Fixed source of "now" for date defaults.
pub type Clock = fn() -> NaiveDateTime;

#[derive(Clone, Copy, Debug)]
enum TimeSource {
    /// Wall clock read in the port's local offset.
    System(FixedOffset),
    Fixed(Clock),
}

impl TimeSource {
    fn now(self) -> NaiveDateTime {
        match self {
            Self::System(offset) => Utc::now().with_timezone(&offset).naive_local(),
            Self::Fixed(clock) => clock(),
        }
    }
}

/// Conversational answer: the result plus what the pipeline understood.
#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub intent: Intent,
    pub entities: EntityMap,
    pub data: Value,
    pub provenance: Provenance,
    #[serde(skip)]
    pub failure: Option<ApplicationError>,
}

impl ChatResponse {
    fn new(intent: Intent, entities: EntityMap, result: AgentResult) -> Self {
        Self {
            message: result.message,
            intent,
            entities,
            data: result.data,
            provenance: result.provenance,
            failure: result.failure,
        }
    }
}

pub struct Orchestrator {
    classifier: IntentClassifier,
    resolver: EntityResolver,
    policy: PolicyEnforcer,
    router: AgentRouter,
    audit: Arc<dyn AuditSink>,
    time: TimeSource,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        resolver: EntityResolver,
        router: AgentRouter,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            classifier,
            resolver,
            policy: PolicyEnforcer::new(),
            router,
            audit,
            time: TimeSource::System(Utc.fix()),
        }
    }

    /// Default patterns and the standard handler wiring.
    pub fn standard(
        collaborators: &Collaborators,
        settings: &HandlerSettings,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, AgentError> {
        Ok(Self::new(
            IntentClassifier::new()?,
            EntityResolver::new()?,
            AgentRouter::standard(collaborators, settings),
            audit,
        )
        .with_utc_offset(settings.utc_offset))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.time = TimeSource::Fixed(clock);
        self
    }

    /// Reads the wall clock at `offset` from UTC. Replaces any fixed clock.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.time = TimeSource::System(offset);
        self
    }

    /// The port's local "now".
    pub fn now(&self) -> NaiveDateTime {
        self.time.now()
    }

    pub fn classify(&self, message: &str, history: &[Intent]) -> Classification {
        self.classifier.classify_with_history(message, history)
    }

    pub fn resolve(&self, message: &str, classification: &Classification) -> EntityMap {
        self.resolver.resolve(message, classification, self.now().date())
    }

    /// Conversational entry. `history` lists earlier intents of the
    /// conversation, oldest first.
    pub async fn handle_chat(
        &self,
        message: &str,
        history: &[Intent],
        caller: &CallerContext,
    ) -> ChatResponse {
        let context = AuditContext::for_caller(caller);

        if !chat_entry_permitted(caller.role) {
            warn!(
                event_name = "agent.orchestrator.chat_denied",
                correlation_id = %caller.trace_id,
                role = %caller.role,
                "conversational entry denied"
            );
            self.audit.emit(
                AuditEvent::new(&context, "chat.denied", AuditCategory::Ingress, AuditOutcome::Rejected)
                    .with_metadata("reason_code", CHAT_NOT_PERMITTED),
            );
            let result = formatter::denied(
                Intent::Unknown,
                caller,
                CHAT_NOT_PERMITTED,
                "Please sign in to use the assistant.",
            );
            let path = vec!["policy:deny".to_owned()];
            return ChatResponse::new(Intent::Unknown, EntityMap::new(), formatter::finalize(result, path));
        }

        let classification = self.classify(message, history);
        let entities = self.resolve(message, &classification);
        let intent = classification.intent;

        info!(
            event_name = "agent.orchestrator.classified",
            correlation_id = %caller.trace_id,
            intent = %intent,
            rules = ?classification.matched_rules,
            entities = entities.len(),
            message_chars = message.chars().count(),
            "message classified"
        );
        self.audit.emit(
            AuditEvent::new(
                &context.clone().with_intent(intent),
                "intent.classified",
                AuditCategory::Classification,
                AuditOutcome::Success,
            )
            .with_metadata("matched_rules", classification.matched_rules.join(","))
            .with_metadata("entities", entity_keys(&entities)),
        );

        let result = self.dispatch(intent, &entities, caller).await;
        ChatResponse::new(intent, entities, result)
    }

    /// Direct operation entry: the intent is known and the entities were
    /// supplied by the caller, so they pass the resolver's normalizers first.
    pub async fn handle_direct(
        &self,
        intent: Intent,
        entities: &EntityMap,
        caller: &CallerContext,
    ) -> AgentResult {
        info!(
            event_name = "agent.orchestrator.direct",
            correlation_id = %caller.trace_id,
            intent = %intent,
            entities = entities.len(),
            "direct operation"
        );

        let entities = match normalize_supplied(entities) {
            Ok(entities) => entities,
            Err(rejection) => {
                warn!(
                    event_name = "agent.orchestrator.entities_rejected",
                    correlation_id = %caller.trace_id,
                    intent = %intent,
                    error = %rejection,
                    "supplied entities rejected"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &AuditContext::for_caller(caller).with_intent(intent),
                        "entities.rejected",
                        AuditCategory::Ingress,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", rejection.to_string()),
                );
                let path = vec![format!("intent:{intent}"), "entities:rejected".to_owned()];
                return formatter::finalize(formatter::malformed_entity(rejection, &caller.trace_id), path);
            }
        };
        self.dispatch(intent, &entities, caller).await
    }

    async fn dispatch(
        &self,
        intent: Intent,
        entities: &EntityMap,
        caller: &CallerContext,
    ) -> AgentResult {
        let context = AuditContext::for_caller(caller).with_intent(intent);
        let mut path = vec![format!("intent:{intent}"), format!("entities:{}", entities.len())];

        let decision = self.policy.authorize(intent, caller, entities);
        path.push(format!("policy:{}", decision.label()));
        if let PolicyDecision::Deny { reason_code, user_message } = decision {
            warn!(
                event_name = "agent.orchestrator.denied",
                correlation_id = %caller.trace_id,
                intent = %intent,
                role = %caller.role,
                reason_code,
                "request denied by policy"
            );
            self.audit.emit(
                AuditEvent::new(&context, "policy.denied", AuditCategory::Authorization, AuditOutcome::Rejected)
                    .with_metadata("reason_code", reason_code),
            );
            return formatter::finalize(formatter::denied(intent, caller, reason_code, &user_message), path);
        }
        self.audit.emit(AuditEvent::new(
            &context,
            "policy.allowed",
            AuditCategory::Authorization,
            AuditOutcome::Success,
        ));

        let handler = self.router.route(intent);
        path.push(format!("handler:{}", handler.name()));
        let request = HandlerRequest { intent, entities, caller, now: self.now() };

        let executed =
            AssertUnwindSafe(handler.execute(&request)).catch_unwind().await.unwrap_or_else(|_| {
                error!(
                    event_name = "agent.orchestrator.handler_panicked",
                    correlation_id = %caller.trace_id,
                    handler = handler.name(),
                    "handler panicked"
                );
                Err(HandlerError::Internal(format!("handler `{}` panicked", handler.name())))
            });

        let (result, outcome) = match executed {
            Ok(result) => {
                let outcome = match result.data_quality() {
                    DataQuality::Fallback | DataQuality::Unavailable => AuditOutcome::Degraded,
                    _ => AuditOutcome::Success,
                };
                (result, outcome)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.orchestrator.handler_failed",
                    correlation_id = %caller.trace_id,
                    handler = handler.name(),
                    error = %error,
                    "handler returned an error"
                );
                let outcome = match error {
                    HandlerError::Upstream { .. } => AuditOutcome::Degraded,
                    HandlerError::Validation { .. } | HandlerError::Internal(_) => AuditOutcome::Failed,
                };
                (formatter::from_handler_error(&error, &caller.trace_id), outcome)
            }
        };

        info!(
            event_name = "agent.orchestrator.completed",
            correlation_id = %caller.trace_id,
            intent = %intent,
            handler = handler.name(),
            outcome = ?outcome,
            "request completed"
        );
        self.audit.emit(
            AuditEvent::new(&context, "handler.completed", AuditCategory::Handler, outcome)
                .with_metadata("handler", handler.name()),
        );

        formatter::finalize(result, path)
    }
}

fn entity_keys(entities: &EntityMap) -> String {
    entities.keys().map(|key| key.as_str()).collect::<Vec<_>>().join(",")
}
