use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde_json::json;
use tracing::info;

use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::operations::TrafficForecast;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_upstream::TrafficModel;

use crate::error::HandlerError;
use crate::formatter;
use crate::handlers::{Handler, HandlerRequest};

const SOURCE: &str = "traffic_model";

pub struct TrafficHandler {
    traffic: Arc<dyn TrafficModel>,
    horizon_hours: u32,
}

impl TrafficHandler {
    pub fn new(traffic: Arc<dyn TrafficModel>, horizon_hours: u32) -> Self {
        Self { traffic, horizon_hours }
    }
}

/// Forecast window start: the current hour for today, midnight otherwise.
fn window_start(request: &HandlerRequest<'_>) -> NaiveDateTime {
    let now = request.now;
    match request.entities.date() {
        Some(date) if date != now.date() => date.and_time(NaiveTime::MIN),
        _ => now.date().and_hms_opt(now.hour(), 0, 0).unwrap_or(now),
    }
}

#[async_trait]
impl Handler for TrafficHandler {
    fn name(&self) -> &'static str {
        "traffic"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let terminal = request.entities.text(EntityKey::Terminal).map(str::to_uppercase);
        let start = window_start(request);

        let forecast = match self
            .traffic
            .predict_traffic(terminal.as_deref(), start, self.horizon_hours, caller)
            .await
        {
            Ok(forecast) => forecast,
            Err(error) if error.is_endpoint_missing() => {
                return Ok(formatter::not_available(
                    "traffic_forecast",
                    "not_implemented",
                    "Traffic forecasting is not available yet.",
                    &caller.trace_id,
                ));
            }
            Err(error) => return Err(HandlerError::upstream(SOURCE)(error)),
        };

        info!(
            event_name = "agent.traffic.forecast",
            correlation_id = %caller.trace_id,
            points = forecast.points.len(),
            "traffic forecast received"
        );

        let message = forecast_message(terminal.as_deref(), start, self.horizon_hours, &forecast);
        let peak = forecast.peak();
        let data = json!({
            "terminal": terminal,
            "start": start,
            "horizon_hours": self.horizon_hours,
            "points": forecast.points,
            "peak": peak,
            "total_volume": forecast.total_volume(),
            "model_version": forecast.model_version,
        });
        let mut provenance =
            Provenance::new(caller.trace_id.clone(), DataQuality::Primary).with_source(SOURCE);
        if let Some(version) = &forecast.model_version {
            provenance = provenance.with_algorithm(version.clone());
        }

        Ok(AgentResult::new(message, data, provenance))
    }
}

fn forecast_message(
    terminal: Option<&str>,
    start: NaiveDateTime,
    horizon_hours: u32,
    forecast: &TrafficForecast,
) -> String {
    let scope = terminal.map(|terminal| format!("terminal {terminal}")).unwrap_or_else(|| "the port".to_owned());
    let window = format!("{} for the next {horizon_hours}h", start.format("%Y-%m-%d %H:%M"));
    match forecast.peak() {
        None => format!("No traffic forecast is available for {scope} from {window}."),
        Some(peak) => format!(
            "Traffic forecast for {scope} from {window}: peak of {:.0} trucks at {}, {:.0} trucks expected in total.",
            peak.volume,
            peak.at.format("%H:%M"),
            forecast.total_volume()
        ),
    }
}
