use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde_json::json;
use tracing::{info, warn};

use portgate_core::analytics::{
    generate_alerts, summarize_alerts, Alert, AlertScope, AlertSeverity, AnomalySignal,
    CapacitySignal, DataMode, StressCalculator, StressReport, StressSignals, TrafficSignal,
    ALGORITHM_TAG,
};
use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::operations::AnomalyFilter;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_upstream::{AnomalyService, BookingService, SlotService, TrafficModel, UpstreamError};

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRequest};

/// Recent anomalies counted toward stress.
const ANOMALY_WINDOW_HOURS: i64 = 6;
const FORECAST_HOURS: u32 = 24;
const LISTED_ALERTS: usize = 5;
const MIN_ALERT_SEVERITY: AlertSeverity = AlertSeverity::Medium;

/// Serves the stress index and proactive alerts for one terminal day.
pub struct AnalyticsHandler {
    slots: Arc<dyn SlotService>,
    traffic: Arc<dyn TrafficModel>,
    anomalies: Arc<dyn AnomalyService>,
    bookings: Arc<dyn BookingService>,
    anomaly_limit: u32,
    calculator: StressCalculator,
}

impl AnalyticsHandler {
    pub fn new(
        slots: Arc<dyn SlotService>,
        traffic: Arc<dyn TrafficModel>,
        anomalies: Arc<dyn AnomalyService>,
        bookings: Arc<dyn BookingService>,
        anomaly_limit: u32,
    ) -> Self {
        Self { slots, traffic, anomalies, bookings, anomaly_limit, calculator: StressCalculator::new() }
    }

    /// Reads every source concurrently. A failed source becomes a gap in the
    /// signals, never a failed request.
    async fn signals(
        &self,
        terminal: &str,
        date: NaiveDate,
        gate: Option<&str>,
        request: &HandlerRequest<'_>,
    ) -> StressSignals {
        let caller = request.caller;
        let filter = AnomalyFilter {
            since: (request.now - Duration::hours(ANOMALY_WINDOW_HOURS)).and_utc(),
            limit: self.anomaly_limit,
            terminal: Some(terminal.to_owned()),
            carrier_id: None,
        };

        let (slots, forecast, anomalies, pending) = tokio::join!(
            self.slots.slot_candidates(terminal, date, gate, caller),
            self.traffic.predict_traffic(
                Some(terminal),
                date.and_time(NaiveTime::MIN),
                FORECAST_HOURS,
                caller
            ),
            self.anomalies.recent_anomalies(&filter, caller),
            self.bookings.pending_bookings(terminal, date, caller),
        );

        let capacity =
            available("slot_service", slots, caller).map(|slots| CapacitySignal::from_slots(&slots));
        StressSignals {
            capacity,
            traffic: available("traffic_model", forecast, caller)
                .and_then(|forecast| TrafficSignal::from_forecast(&forecast, capacity)),
            anomalies: available("anomaly_service", anomalies, caller)
                .map(|records| AnomalySignal::from_records(&records)),
            pending_bookings: available("booking_service", pending, caller),
        }
    }
}

fn available<T>(
    source: &'static str,
    outcome: Result<T, UpstreamError>,
    caller: &CallerContext,
) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(
                event_name = "agent.analytics.source_unavailable",
                correlation_id = %caller.trace_id,
                source,
                error = %error,
                "estimating without source"
            );
            None
        }
    }
}

#[async_trait]
impl Handler for AnalyticsHandler {
    fn name(&self) -> &'static str {
        "analytics"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let terminal = request
            .entities
            .text(EntityKey::Terminal)
            .ok_or_else(|| HandlerError::missing(EntityKey::Terminal))?
            .to_uppercase();
        let date = request.entities.date().unwrap_or_else(|| request.now.date());
        let gate = match request.intent {
            Intent::AnalyticsStressIndex => request.entities.text(EntityKey::Gate),
            _ => None,
        };

        let signals = self.signals(&terminal, date, gate, request).await;
        let report = self.calculator.compute(&signals);
        info!(
            event_name = "agent.analytics.stress_computed",
            correlation_id = %caller.trace_id,
            terminal = %terminal,
            stress_index = report.stress_index,
            stress_level = report.level.as_str(),
            missing = report.missing_sources.len(),
            "stress index computed"
        );

        let mut provenance = Provenance::new(caller.trace_id.clone(), quality(report.data_mode))
            .with_algorithm(ALGORITHM_TAG);
        for source in ["slot_service", "traffic_model", "anomaly_service", "booking_service"] {
            if !report.missing_sources.iter().any(|missing| missing == source) {
                provenance = provenance.with_source(source);
            }
        }

        if request.intent != Intent::AnalyticsAlerts {
            let data = json!({
                "terminal": terminal,
                "gate": gate,
                "date": date,
                "report": report,
            });
            return Ok(AgentResult::new(stress_message(&terminal, &report), data, provenance));
        }

        let scope = AlertScope { terminal: &terminal, date };
        let alerts = generate_alerts(scope, &report, &signals, MIN_ALERT_SEVERITY);
        let data = json!({
            "terminal": terminal,
            "date": date,
            "stress_index": report.stress_index,
            "data_mode": report.data_mode,
            "alerts_count": alerts.len(),
            "alerts": alerts,
            "summary": summarize_alerts(&alerts),
        });
        Ok(AgentResult::new(alerts_message(&terminal, &alerts), data, provenance))
    }
}

fn quality(mode: DataMode) -> DataQuality {
    match mode {
        DataMode::Real => DataQuality::Primary,
        DataMode::Hybrid | DataMode::Estimated => DataQuality::Fallback,
    }
}

fn stress_message(terminal: &str, report: &StressReport) -> String {
    let drivers = &report.drivers;
    let mut message = format!(
        "Terminal {terminal} stress index: {}/100 ({}). Drivers: capacity {:.1}, traffic {:.1}, anomalies {:.1}, queue {:.1}.",
        report.stress_index,
        report.level.as_str().to_uppercase(),
        drivers.capacity_pressure,
        drivers.traffic_pressure,
        drivers.anomaly_pressure,
        drivers.queue_pressure,
    );
    if let Some(first) = report.recommendations.first() {
        let _ = write!(message, " Recommendation: {first}");
    }
    if report.data_mode != DataMode::Real {
        let _ = write!(message, " (estimated without {})", report.missing_sources.join(", "));
    }
    message
}

fn alerts_message(terminal: &str, alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return format!("No active alerts for terminal {terminal}. Operations normal.");
    }

    let mut message = format!("{} alert(s) for terminal {terminal}:", alerts.len());
    for (position, alert) in alerts.iter().take(LISTED_ALERTS).enumerate() {
        let _ = write!(
            message,
            "\n{}. [{}] {}",
            position + 1,
            alert.severity.as_str().to_uppercase(),
            alert.title
        );
    }
    if alerts.len() > LISTED_ALERTS {
        let _ = write!(message, "\n... and {} more alert(s)", alerts.len() - LISTED_ALERTS);
    }
    message
}
