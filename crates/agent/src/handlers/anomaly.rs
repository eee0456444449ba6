use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::json;
use tracing::info;

use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::operations::{AnomalyFilter, AnomalyRecord, AnomalySeverity};
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_upstream::AnomalyService;

use crate::error::HandlerError;
use crate::formatter;
use crate::handlers::{Handler, HandlerRequest};

const SOURCE: &str = "anomaly_service";

pub struct AnomalyHandler {
    anomalies: Arc<dyn AnomalyService>,
    lookback_days: u32,
    limit: u32,
}

impl AnomalyHandler {
    pub fn new(anomalies: Arc<dyn AnomalyService>, lookback_days: u32, limit: u32) -> Self {
        Self { anomalies, lookback_days, limit }
    }

    fn filter(&self, request: &HandlerRequest<'_>) -> AnomalyFilter {
        let since: DateTime<Utc> = match request.entities.date() {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => (request.now - Duration::days(i64::from(self.lookback_days))).and_utc(),
        };
        AnomalyFilter {
            since,
            limit: self.limit,
            terminal: request.entities.text(EntityKey::Terminal).map(str::to_uppercase),
            carrier_id: request.entities.carrier_id(),
        }
    }
}

#[async_trait]
impl Handler for AnomalyHandler {
    fn name(&self) -> &'static str {
        "anomaly"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let filter = self.filter(request);

        let records = match self.anomalies.recent_anomalies(&filter, caller).await {
            Ok(records) => records,
            Err(error) if error.is_endpoint_missing() => {
                return Ok(formatter::not_available(
                    "anomaly_detection",
                    "not_implemented",
                    "Anomaly detection is not available yet.",
                    &caller.trace_id,
                ));
            }
            Err(error) => return Err(HandlerError::upstream(SOURCE)(error)),
        };

        let by_severity = count_by_severity(&records);
        info!(
            event_name = "agent.anomaly.listed",
            correlation_id = %caller.trace_id,
            count = records.len(),
            "anomalies listed"
        );

        let data = json!({
            "since": filter.since,
            "terminal": filter.terminal,
            "carrier_id": filter.carrier_id,
            "count": records.len(),
            "by_severity": by_severity,
            "anomalies": records,
        });
        let provenance =
            Provenance::new(caller.trace_id.clone(), DataQuality::Primary).with_source(SOURCE);

        Ok(AgentResult::new(anomaly_message(&filter, &records, &by_severity), data, provenance))
    }
}

fn count_by_severity(records: &[AnomalyRecord]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> =
        AnomalySeverity::ALL.iter().map(|severity| (severity.as_str(), 0)).collect();
    for record in records {
        *counts.entry(record.severity.as_str()).or_default() += 1;
    }
    counts
}

fn anomaly_message(
    filter: &AnomalyFilter,
    records: &[AnomalyRecord],
    by_severity: &BTreeMap<&'static str, usize>,
) -> String {
    let since = filter.since.format("%Y-%m-%d %H:%M");
    if records.is_empty() {
        return format!("No anomalies detected since {since}.");
    }

    // Most severe first.
    let breakdown: Vec<String> = AnomalySeverity::ALL
        .iter()
        .rev()
        .filter_map(|severity| {
            let count = by_severity.get(severity.as_str()).copied().unwrap_or_default();
            (count > 0).then(|| format!("{count} {}", severity.as_str()))
        })
        .collect();
    format!("{} anomalies detected since {since} ({}).", records.len(), breakdown.join(", "))
}
