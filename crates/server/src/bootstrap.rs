use std::sync::Arc;

use portgate_agent::{AgentError, HandlerSettings, Orchestrator};
use portgate_core::audit::AuditSink;
use portgate_core::config::{AppConfig, ConfigError};
use portgate_upstream::{Collaborators, UpstreamError};
use thiserror::Error;
use tracing::info;

use crate::audit_log::TracingAuditSink;

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("collaborator client setup failed: {0}")]
    Collaborators(#[source] UpstreamError),
    #[error("agent pipeline setup failed: {0}")]
    Pipeline(#[source] AgentError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let collaborators =
        Collaborators::http(&config.services).map_err(BootstrapError::Collaborators)?;
    info!(
        event_name = "system.bootstrap.collaborators_ready",
        correlation_id = "bootstrap",
        booking_url = %config.services.booking_url,
        slot_url = %config.services.slot_url,
        carrier_url = %config.services.carrier_url,
        analytics_url = %config.services.analytics_url,
        ledger_url = %config.services.ledger_url,
        "collaborator clients configured"
    );

    let application = assemble(config, &collaborators, Arc::new(TracingAuditSink))?;
    info!(
        event_name = "system.bootstrap.pipeline_ready",
        correlation_id = "bootstrap",
        "agent pipeline assembled"
    );
    Ok(application)
}

/// Wires the pipeline over any collaborator set.
pub fn assemble(
    config: AppConfig,
    collaborators: &Collaborators,
    audit: Arc<dyn AuditSink>,
) -> Result<Application, BootstrapError> {
    let settings = HandlerSettings::from_config(&config.agents);
    let orchestrator =
        Orchestrator::standard(collaborators, &settings, audit).map_err(BootstrapError::Pipeline)?;
    Ok(Application { config, orchestrator: Arc::new(orchestrator) })
}
