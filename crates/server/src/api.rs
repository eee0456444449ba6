//! HTTP surface over the orchestrator. Caller identity arrives in headers set
//! by the authenticating gateway in front of this service.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use portgate_agent::{ChatResponse, Orchestrator};
use portgate_core::domain::caller::{CallerContext, Role};
use portgate_core::domain::carrier::CarrierId;
use portgate_core::domain::entity::EntityMap;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::result::AgentResult;
use portgate_core::errors::{ApplicationError, DomainError, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const ROLE_HEADER: &str = "x-user-role";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const CARRIER_ID_HEADER: &str = "x-carrier-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const AUTHORIZATION_HEADER: &str = "authorization";

#[derive(Clone)]
pub struct ApiState {
    orchestrator: Arc<Orchestrator>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Earlier intents of the conversation, oldest first.
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OperationRequest {
    #[serde(default)]
    pub entities: EntityMap,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/v1/chat", post(chat))
        .route("/v1/operations/{intent}", post(operation))
        .with_state(ApiState { orchestrator })
}

/// Builds the request's caller from gateway headers. Missing or unknown roles
/// become anonymous; a missing request id gets a fresh one.
pub fn caller_from_headers(headers: &HeaderMap) -> CallerContext {
    let role = Role::normalize(header(headers, ROLE_HEADER));
    let trace_id = header(headers, REQUEST_ID_HEADER)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut caller = CallerContext::new(role, trace_id);
    if let Some(user_id) = header(headers, USER_ID_HEADER) {
        caller = caller.with_caller_id(user_id);
    }
    if let Some(carrier_id) = header(headers, CARRIER_ID_HEADER) {
        caller = caller.with_carrier_scope(CarrierId::new(carrier_id));
    }
    if let Some(token) = header(headers, AUTHORIZATION_HEADER) {
        caller = caller.with_auth_token(token);
    }
    caller
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn interface_status(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Failed results keep their body; the status follows their typed failure.
/// Fallback answers carry no failure and stay 200.
fn status_for(failure: Option<&ApplicationError>, caller: &CallerContext) -> StatusCode {
    failure.map_or(StatusCode::OK, |failure| {
        interface_status(&failure.clone().into_interface(caller.trace_id.clone()))
    })
}

fn failure(error: InterfaceError) -> ApiFailure {
    let status = interface_status(&error);
    let error_class = match &error {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::Forbidden { .. } => "forbidden",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    };
    let message = match &error {
        InterfaceError::BadRequest { message, .. } => message.clone(),
        _ => error.user_message().to_owned(),
    };
    (
        status,
        Json(ApiError { error: error_class, message, correlation_id: error.correlation_id().to_owned() }),
    )
}

fn malformed(field: &'static str, detail: String, caller: &CallerContext) -> ApiFailure {
    warn!(
        event_name = "server.api.bad_request",
        correlation_id = %caller.trace_id,
        field,
        detail = %detail,
        "request rejected before the pipeline"
    );
    failure(
        ApplicationError::Domain(DomainError::MalformedEntity { field, detail })
            .into_interface(caller.trace_id.clone()),
    )
}

async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiFailure> {
    let caller = caller_from_headers(&headers);
    let Json(request) = body.map_err(|rejection| malformed("body", rejection.body_text(), &caller))?;

    // Unrecognized names are dropped rather than failing the turn.
    let history: Vec<Intent> =
        request.history.iter().filter_map(|name| name.parse().ok()).collect();
    info!(
        event_name = "server.api.chat",
        correlation_id = %caller.trace_id,
        role = %caller.role,
        history = history.len(),
        "chat request received"
    );

    let response = state.orchestrator.handle_chat(&request.message, &history, &caller).await;
    Ok((status_for(response.failure.as_ref(), &caller), Json(response)))
}

async fn operation(
    State(state): State<ApiState>,
    Path(intent): Path<String>,
    headers: HeaderMap,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AgentResult>), ApiFailure> {
    let caller = caller_from_headers(&headers);
    let intent: Intent = intent
        .parse()
        .map_err(|_| malformed("intent", format!("unknown operation `{intent}`"), &caller))?;
    let Json(request) = body.map_err(|rejection| malformed("body", rejection.body_text(), &caller))?;

    info!(
        event_name = "server.api.operation",
        correlation_id = %caller.trace_id,
        role = %caller.role,
        intent = %intent,
        "operation request received"
    );

    let result = state.orchestrator.handle_direct(intent, &request.entities, &caller).await;
    Ok((status_for(result.failure.as_ref(), &caller), Json(result)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, HeaderValue, Request, StatusCode},
        Router,
    };
    use chrono::{NaiveDate, NaiveDateTime};
    use portgate_agent::{HandlerSettings, Orchestrator};
    use portgate_core::audit::NoopAuditSink;
    use portgate_core::domain::caller::Role;
    use portgate_core::domain::carrier::{CarrierId, CarrierStatistics};
    use portgate_core::domain::slot::SlotCandidate;
    use portgate_upstream::{Collaborator, Collaborators, InMemoryPort, UpstreamError};
    use secrecy::ExposeSecret;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{caller_from_headers, router};

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .and_then(|date| date.and_hms_opt(8, 15, 0))
            .expect("valid timestamp")
    }

    fn port() -> InMemoryPort {
        let nine = fixed_now().date().and_hms_opt(9, 0, 0).expect("valid timestamp");
        InMemoryPort::new()
            .with_carrier_stats(
                "123",
                CarrierStatistics { total_bookings: 80, completed_bookings: 78, ..Default::default() },
            )
            .with_slot(SlotCandidate::new(nine, "A", Some("G1".to_owned()), 7, 10).expect("valid slot"))
    }

    fn app() -> Router {
        app_over(port())
    }

    fn app_over(port: InMemoryPort) -> Router {
        let orchestrator = Orchestrator::standard(
            &Collaborators::in_memory(Arc::new(port)),
            &HandlerSettings::default(),
            Arc::new(NoopAuditSink),
        )
        .expect("default patterns compile")
        .with_clock(fixed_now);
        router(Arc::new(orchestrator))
    }

    async fn post(app: Router, uri: &str, headers: &[(&str, &str)], body: Value) -> (StatusCode, Value) {
        let mut request = Request::post(uri).header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = app
            .oneshot(request.body(Body::from(body.to_string())).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[test]
    fn caller_reads_gateway_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-role", HeaderValue::from_static("carrier"));
        headers.insert("x-user-id", HeaderValue::from_static("u-42"));
        headers.insert("x-carrier-id", HeaderValue::from_static("123"));
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));

        let caller = caller_from_headers(&headers);

        assert_eq!(caller.role, Role::Carrier);
        assert_eq!(caller.caller_id.as_deref(), Some("u-42"));
        assert_eq!(caller.carrier_scope, Some(CarrierId::new("123")));
        assert_eq!(caller.trace_id, "req-1");
        assert_eq!(
            caller.auth_token.as_ref().map(|token| token.expose_secret().to_owned()),
            Some("Bearer abc".to_owned())
        );
    }

    #[test]
    fn missing_headers_mean_anonymous_with_fresh_trace() {
        let caller = caller_from_headers(&HeaderMap::new());
        assert_eq!(caller.role, Role::Anon);
        assert_eq!(caller.trace_id.len(), 36);
        assert!(caller.carrier_scope.is_none());
    }

    #[tokio::test]
    async fn chat_returns_intent_entities_and_provenance() {
        let (status, body) = post(
            app(),
            "/v1/chat",
            &[("x-user-role", "OPERATOR"), ("x-request-id", "req-chat")],
            json!({ "message": "What is the reliability score of carrier 123?" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intent"], "carrier_score");
        assert_eq!(body["entities"]["carrier_id"], "123");
        assert_eq!(body["provenance"]["trace_id"], "req-chat");
    }

    #[tokio::test]
    async fn denied_chat_is_forbidden_with_details() {
        let (status, body) = post(
            app(),
            "/v1/chat",
            &[("x-user-role", "DRIVER"), ("x-carrier-id", "123")],
            json!({ "message": "Detect anomalies in terminal A" }),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["data"]["reason_code"], "role_not_permitted");
        assert_eq!(body["data"]["requested_intent"], "anomaly_detection");
    }

    #[tokio::test]
    async fn anonymous_operation_reads_slots() {
        let (status, body) = post(
            app(),
            "/v1/operations/slot_availability",
            &[],
            json!({ "entities": { "terminal": "A", "date": "2026-03-02" } }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["slots"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn bad_operations_are_rejected() {
        let (status, body) =
            post(app(), "/v1/operations/teleport", &[("x-user-role", "ADMIN")], json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, body) = post(
            app(),
            "/v1/operations/traffic_forecast",
            &[("x-user-role", "ADMIN")],
            json!({ "entities": { "date": "next week" } }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().is_some_and(|message| message.contains("body")));

        let (status, body) = post(
            app(),
            "/v1/operations/slot_availability",
            &[("x-user-role", "OPERATOR")],
            json!({ "entities": {} }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["missing_field"], "terminal");
    }

    #[tokio::test]
    async fn supplied_entities_are_validated_before_any_lookup() {
        for entities in [
            json!({ "carrier_id": "../admin" }),
            json!({ "carrier_id": "123/stats" }),
            json!({ "booking_ref": "../x" }),
            json!({ "booking_ref": ["REF123", "REF1/../../admin"] }),
        ] {
            let intent =
                if entities.get("carrier_id").is_some() { "carrier_score" } else { "booking_status" };
            let (status, body) = post(
                app(),
                &format!("/v1/operations/{intent}"),
                &[("x-user-role", "ADMIN")],
                json!({ "entities": entities }),
            )
            .await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{entities}");
            assert_eq!(body["data"]["error"], "ValidationError");
            assert!(body["data"]["malformed_field"].is_string(), "{entities}");
            assert!(body.get("failure").is_none());
        }
    }

    #[tokio::test]
    async fn analytics_operations_are_staff_only() {
        let entities = json!({ "entities": { "terminal": "a", "date": "2026-03-02" } });

        let (status, body) = post(
            app(),
            "/v1/operations/analytics_alerts",
            &[("x-user-role", "CARRIER"), ("x-carrier-id", "123")],
            entities.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["data"]["reason_code"], "role_not_permitted");

        let (status, body) =
            post(app(), "/v1/operations/analytics_alerts", &[("x-user-role", "OPERATOR")], entities)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["terminal"], "A");
        assert!(body["data"]["alerts"].is_array());
    }

    #[tokio::test]
    async fn status_follows_the_typed_failure() {
        let (status, body) = post(
            app_over(port().with_failure(Collaborator::Slot, UpstreamError::Timeout)),
            "/v1/operations/slot_availability",
            &[("x-user-role", "OPERATOR")],
            json!({ "entities": { "terminal": "A" } }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["data"]["error"], "UpstreamUnavailable");

        let (status, body) = post(
            app(),
            "/v1/operations/carrier_score",
            &[("x-user-role", "OPERATOR")],
            json!({ "entities": { "carrier_id": "123" } }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["carrier_id"], "123");
    }
}
