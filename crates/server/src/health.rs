use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use portgate_core::config::ServicesConfig;
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct HealthState {
    collaborators: Vec<(&'static str, String)>,
}

impl HealthState {
    pub fn from_services(services: &ServicesConfig) -> Self {
        Self {
            collaborators: vec![
                ("booking_service", services.booking_url.clone()),
                ("slot_service", services.slot_url.clone()),
                ("carrier_service", services.carrier_url.clone()),
                ("analytics_service", services.analytics_url.clone()),
                ("ledger_service", services.ledger_url.clone()),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub collaborators: Vec<HealthCheck>,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let collaborators: Vec<HealthCheck> =
        state.collaborators.iter().map(|(name, url)| configuration_check(name, url)).collect();
    let ready = collaborators.iter().all(|check| check.status == "ready");

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            name: "portgate",
            status: "ready",
            detail: "agent pipeline initialized".to_owned(),
        },
        collaborators,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Readiness here means "configured"; collaborators are not called.
fn configuration_check(name: &'static str, url: &str) -> HealthCheck {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        HealthCheck { name, status: "ready", detail: format!("configured at {url}") }
    } else {
        HealthCheck { name, status: "degraded", detail: "no valid base URL configured".to_owned() }
    }
}
