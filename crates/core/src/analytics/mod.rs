//! Terminal stress index and proactive alerts.
//!
//! Both are total functions over signals the caller already fetched. A
//! missing signal is replaced by a neutral value and listed in the report,
//! so the index is always computable and its [`DataMode`] says how much of
//! it was measured.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::operations::{AnomalyRecord, AnomalySeverity, TrafficForecast};
use crate::domain::slot::SlotCandidate;

pub const ALGORITHM_TAG: &str = "weighted_stress_index@v1";

pub const LOW_MAX: f64 = 30.0;
pub const MEDIUM_MAX: f64 = 60.0;
pub const HIGH_MAX: f64 = 85.0;

const NEUTRAL_UTILIZATION: f64 = 0.5;
const NEUTRAL_TRAFFIC_INTENSITY: f64 = 0.5;
/// Capacity assumed for queue pressure when slot data is missing.
const NEUTRAL_TOTAL_CAPACITY: u32 = 100;
/// Anomaly count at which the frequency term saturates.
const ANOMALY_SATURATION: f64 = 5.0;
const ANOMALY_FREQUENCY_SHARE: f64 = 0.7;
const ANOMALY_SEVERITY_SHARE: f64 = 0.3;

const CRITICAL_UTILIZATION: f64 = 0.90;
const HIGH_UTILIZATION: f64 = 0.75;
const MODERATE_UTILIZATION: f64 = 0.60;
const HIGH_TRAFFIC_INTENSITY: f64 = 0.75;
const ANOMALY_SPIKE_COUNT: u32 = 5;
const CRITICAL_ANOMALY_SEVERITY: f64 = 0.7;

/// Weights for the four stress drivers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressWeights {
    /// Weight for slot utilization (default: 0.40)
    pub capacity: f64,
    /// Weight for forecast traffic (default: 0.30)
    pub traffic: f64,
    /// Weight for recent anomalies (default: 0.20)
    pub anomaly: f64,
    /// Weight for unconfirmed bookings (default: 0.10)
    pub queue: f64,
}

pub const DEFAULT_WEIGHTS: StressWeights =
    StressWeights { capacity: 0.40, traffic: 0.30, anomaly: 0.20, queue: 0.10 };

impl Default for StressWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// Aggregate slot capacity of one terminal day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySignal {
    pub total_capacity: u32,
    pub remaining: u32,
}

impl CapacitySignal {
    pub fn from_slots(slots: &[SlotCandidate]) -> Self {
        slots.iter().fold(Self::default(), |acc, slot| Self {
            total_capacity: acc.total_capacity.saturating_add(slot.capacity),
            remaining: acc.remaining.saturating_add(slot.remaining.min(slot.capacity)),
        })
    }

    /// Booked share of the capacity, 0 when the terminal has no slots.
    pub fn utilization(&self) -> f64 {
        if self.total_capacity == 0 {
            return 0.0;
        }
        (1.0 - f64::from(self.remaining) / f64::from(self.total_capacity)).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficSignal {
    /// Expected demand over available capacity, in `0..=1`.
    pub intensity: f64,
    pub peak_at: Option<NaiveDateTime>,
}

impl TrafficSignal {
    /// Forecast volume for the day against the day's slot capacity. Without
    /// a known capacity the intensity stays neutral; an empty forecast is no
    /// signal at all.
    pub fn from_forecast(forecast: &TrafficForecast, capacity: Option<CapacitySignal>) -> Option<Self> {
        let peak = forecast.peak()?;
        let intensity = match capacity {
            Some(capacity) if capacity.total_capacity > 0 => {
                forecast.total_volume() / f64::from(capacity.total_capacity)
            }
            _ => NEUTRAL_TRAFFIC_INTENSITY,
        };
        Some(Self { intensity: unit(intensity), peak_at: Some(peak.at) })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySignal {
    pub count: u32,
    /// Mean severity in `0..=1`.
    pub severity_avg: f64,
}

impl AnomalySignal {
    pub fn from_records(records: &[AnomalyRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let total: f64 = records.iter().map(|record| severity_weight(record.severity)).sum();
        let count = u32::try_from(records.len()).unwrap_or(u32::MAX);
        Self { count, severity_avg: total / records.len() as f64 }
    }
}

pub fn severity_weight(severity: AnomalySeverity) -> f64 {
    match severity {
        AnomalySeverity::Low => 0.25,
        AnomalySeverity::Medium => 0.5,
        AnomalySeverity::High => 0.75,
        AnomalySeverity::Critical => 1.0,
    }
}

/// Everything the stress index reads. `None` marks a source that could not
/// be read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StressSignals {
    pub capacity: Option<CapacitySignal>,
    pub traffic: Option<TrafficSignal>,
    pub anomalies: Option<AnomalySignal>,
    pub pending_bookings: Option<u32>,
}

impl StressSignals {
    pub fn missing_sources(&self) -> Vec<&'static str> {
        [
            (self.capacity.is_none(), "slot_service"),
            (self.traffic.is_none(), "traffic_model"),
            (self.anomalies.is_none(), "anomaly_service"),
            (self.pending_bookings.is_none(), "booking_service"),
        ]
        .into_iter()
        .filter_map(|(missing, source)| missing.then_some(source))
        .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl StressLevel {
    pub fn from_index(index: f64) -> Self {
        if index <= LOW_MAX {
            Self::Low
        } else if index <= MEDIUM_MAX {
            Self::Medium
        } else if index <= HIGH_MAX {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// How much of the index rests on measured data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    Real,
    Hybrid,
    Estimated,
}

impl DataMode {
    fn from_missing(missing: usize) -> Self {
        match missing {
            0 => Self::Real,
            1 | 2 => Self::Hybrid,
            _ => Self::Estimated,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StressDrivers {
    pub capacity_pressure: f64,
    pub traffic_pressure: f64,
    pub anomaly_pressure: f64,
    pub queue_pressure: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub stress_index: f64,
    pub level: StressLevel,
    pub drivers: StressDrivers,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub utilization: f64,
    pub anomaly_count: u32,
    pub pending_bookings: u32,
    pub data_mode: DataMode,
    pub missing_sources: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StressCalculator {
    weights: StressWeights,
}

impl StressCalculator {
    pub fn new() -> Self {
        Self { weights: StressWeights::default() }
    }

    pub fn with_weights(weights: StressWeights) -> Self {
        Self { weights }
    }

    pub fn compute(&self, signals: &StressSignals) -> StressReport {
        let utilization = signals.capacity.map_or(NEUTRAL_UTILIZATION, |c| c.utilization());
        let total_capacity =
            signals.capacity.map_or(NEUTRAL_TOTAL_CAPACITY, |capacity| capacity.total_capacity);
        let intensity =
            signals.traffic.map_or(NEUTRAL_TRAFFIC_INTENSITY, |traffic| unit(traffic.intensity));
        let anomalies = signals.anomalies.unwrap_or_default();
        let pending = signals.pending_bookings.unwrap_or(0);

        let frequency = (f64::from(anomalies.count) / ANOMALY_SATURATION * 100.0).min(100.0);
        let queue_pressure = if total_capacity == 0 {
            0.0
        } else {
            (f64::from(pending) / f64::from(total_capacity) * 100.0).min(100.0)
        };
        let drivers = StressDrivers {
            capacity_pressure: utilization * 100.0,
            traffic_pressure: intensity * 100.0,
            anomaly_pressure: (frequency * ANOMALY_FREQUENCY_SHARE
                + unit(anomalies.severity_avg) * 100.0 * ANOMALY_SEVERITY_SHARE)
                .min(100.0),
            queue_pressure,
        };

        let stress_index = round1(
            drivers.capacity_pressure * self.weights.capacity
                + drivers.traffic_pressure * self.weights.traffic
                + drivers.anomaly_pressure * self.weights.anomaly
                + drivers.queue_pressure * self.weights.queue,
        );
        let level = StressLevel::from_index(stress_index);
        let (reasons, recommendations) =
            explain(&drivers, level, utilization, intensity, anomalies, pending);
        let missing = signals.missing_sources();

        StressReport {
            stress_index,
            level,
            drivers: StressDrivers {
                capacity_pressure: round1(drivers.capacity_pressure),
                traffic_pressure: round1(drivers.traffic_pressure),
                anomaly_pressure: round1(drivers.anomaly_pressure),
                queue_pressure: round1(drivers.queue_pressure),
            },
            reasons,
            recommendations,
            utilization: round3(utilization),
            anomaly_count: anomalies.count,
            pending_bookings: pending,
            data_mode: DataMode::from_missing(missing.len()),
            missing_sources: missing.into_iter().map(str::to_owned).collect(),
        }
    }
}

fn explain(
    drivers: &StressDrivers,
    level: StressLevel,
    utilization: f64,
    intensity: f64,
    anomalies: AnomalySignal,
    pending: u32,
) -> (Vec<String>, Vec<String>) {
    let mut reasons = Vec::new();
    let mut recommendations = Vec::new();
    let percent = |ratio: f64| format!("{:.0}%", ratio * 100.0);

    if drivers.capacity_pressure >= 90.0 {
        reasons.push(format!("Capacity almost full ({} utilized)", percent(utilization)));
        recommendations.push("Consider opening additional time slots or gates".to_owned());
    } else if drivers.capacity_pressure >= 75.0 {
        reasons.push(format!("High capacity utilization ({})", percent(utilization)));
        recommendations.push("Monitor slot availability closely".to_owned());
    } else if drivers.capacity_pressure < 30.0 {
        reasons.push(format!("Low capacity utilization ({})", percent(utilization)));
    }

    if drivers.traffic_pressure >= 75.0 {
        reasons.push(format!("High traffic intensity expected ({})", percent(intensity)));
        recommendations.push("Prepare for peak traffic periods".to_owned());
    } else if drivers.traffic_pressure >= 50.0 {
        reasons.push(format!("Moderate traffic forecast ({})", percent(intensity)));
    }

    if anomalies.count > 0 {
        reasons.push(format!("{} recent anomaly event(s)", anomalies.count));
        if anomalies.severity_avg > CRITICAL_ANOMALY_SEVERITY {
            recommendations.push("Investigate high-severity anomalies immediately".to_owned());
        } else if anomalies.count >= 3 {
            recommendations.push("Review recent anomaly patterns".to_owned());
        }
    }

    if pending > 0 {
        reasons.push(format!("{pending} pending booking(s)"));
        if drivers.queue_pressure > 50.0 {
            recommendations.push("Expedite pending booking confirmations".to_owned());
        }
    }

    match level {
        StressLevel::Critical => recommendations
            .insert(0, "URGENT: Implement congestion mitigation measures".to_owned()),
        StressLevel::High => {
            recommendations.insert(0, "Consider proactive load balancing".to_owned())
        }
        StressLevel::Low => recommendations.push("Continue normal operations".to_owned()),
        StressLevel::Medium => {}
    }

    (reasons, recommendations)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 4] =
        [AlertSeverity::Low, AlertSeverity::Medium, AlertSeverity::High, AlertSeverity::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Stress,
    Capacity,
    Traffic,
    Anomaly,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stress => "stress",
            Self::Capacity => "capacity",
            Self::Traffic => "traffic",
            Self::Anomaly => "anomaly",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Stable for one terminal, day and kind, so repeated runs agree.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub recommended_actions: Vec<String>,
    pub evidence: serde_json::Value,
}

/// Where the alerts apply.
#[derive(Clone, Copy, Debug)]
pub struct AlertScope<'a> {
    pub terminal: &'a str,
    pub date: NaiveDate,
}

impl AlertScope<'_> {
    fn alert_id(&self, kind: AlertKind) -> String {
        format!(
            "ALERT-{}-{}-{}",
            kind.as_str().to_ascii_uppercase(),
            self.terminal.to_ascii_uppercase(),
            self.date.format("%Y%m%d")
        )
    }
}

/// Alerts at or above `min_severity`, most severe first. Only measured
/// signals raise alerts; neutral stand-ins never do.
pub fn generate_alerts(
    scope: AlertScope<'_>,
    report: &StressReport,
    signals: &StressSignals,
    min_severity: AlertSeverity,
) -> Vec<Alert> {
    let terminal = scope.terminal;
    let mut alerts = Vec::new();

    if report.stress_index > MEDIUM_MAX {
        let severity =
            if report.stress_index > HIGH_MAX { AlertSeverity::Critical } else { AlertSeverity::High };
        let lead = report.reasons.first().map(String::as_str).unwrap_or_default();
        alerts.push(Alert {
            id: scope.alert_id(AlertKind::Stress),
            kind: AlertKind::Stress,
            severity,
            title: format!("High Stress Level at Terminal {terminal}"),
            message: format!(
                "Terminal {terminal} is experiencing {} stress (index: {}/100). {lead}",
                report.level.as_str(),
                report.stress_index
            )
            .trim_end()
            .to_owned(),
            recommended_actions: report.recommendations.clone(),
            evidence: serde_json::json!({
                "stress_index": report.stress_index,
                "drivers": report.drivers,
            }),
        });
    }

    if let Some(capacity) = signals.capacity.filter(|capacity| capacity.total_capacity > 0) {
        if let Some(alert) = capacity_alert(&scope, capacity) {
            alerts.push(alert);
        }
    }

    if let Some(traffic) = signals.traffic.filter(|t| t.intensity >= HIGH_TRAFFIC_INTENSITY) {
        let peak = traffic
            .peak_at
            .map(|at| at.format("%H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_owned());
        alerts.push(Alert {
            id: scope.alert_id(AlertKind::Traffic),
            kind: AlertKind::Traffic,
            severity: AlertSeverity::High,
            title: format!("High Traffic Expected at Terminal {terminal}"),
            message: format!(
                "Traffic forecast shows {:.0}% intensity. Peak expected around {peak}.",
                traffic.intensity * 100.0
            ),
            recommended_actions: actions(&[
                "Allocate additional staff for peak periods",
                "Prepare for increased processing times",
                "Ensure all gates are operational",
            ]),
            evidence: serde_json::json!({
                "intensity": round3(traffic.intensity),
                "peak_hour": peak,
            }),
        });
    }

    if let Some(anomalies) = signals.anomalies.filter(|a| a.count >= ANOMALY_SPIKE_COUNT) {
        let severity = if anomalies.severity_avg >= CRITICAL_ANOMALY_SEVERITY {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        };
        alerts.push(Alert {
            id: scope.alert_id(AlertKind::Anomaly),
            kind: AlertKind::Anomaly,
            severity,
            title: format!("Anomaly Spike Detected at Terminal {terminal}"),
            message: format!(
                "{} anomaly event(s) detected recently. Average severity: {:.0}%.",
                anomalies.count,
                anomalies.severity_avg * 100.0
            ),
            recommended_actions: actions(&[
                "Investigate anomaly root causes immediately",
                "Review system logs and sensor data",
                "Check for equipment malfunctions",
                "Notify technical support team",
            ]),
            evidence: serde_json::json!({
                "anomaly_count": anomalies.count,
                "severity_avg": round3(anomalies.severity_avg),
                "threshold": ANOMALY_SPIKE_COUNT,
            }),
        });
    }

    alerts.retain(|alert| alert.severity >= min_severity);
    // Stable: equal severities keep generation order.
    alerts.sort_by(|left, right| right.severity.cmp(&left.severity));
    alerts
}

fn capacity_alert(scope: &AlertScope<'_>, capacity: CapacitySignal) -> Option<Alert> {
    let terminal = scope.terminal;
    let utilization = capacity.utilization();
    let remaining = capacity.remaining;
    let percent = utilization * 100.0;

    let (severity, title, message, recommended) = if utilization >= CRITICAL_UTILIZATION {
        (
            AlertSeverity::Critical,
            format!("Critical Capacity at Terminal {terminal}"),
            format!(
                "Terminal {terminal} is at {percent:.0}% capacity with only {remaining} slot(s) remaining. Immediate action required."
            ),
            actions(&[
                "Open additional time slots immediately",
                "Redirect new bookings to alternative terminals",
                "Contact operations team for capacity expansion",
            ]),
        )
    } else if utilization >= HIGH_UTILIZATION {
        (
            AlertSeverity::High,
            format!("High Capacity Utilization at Terminal {terminal}"),
            format!("Terminal {terminal} is at {percent:.0}% capacity. {remaining} slot(s) remaining."),
            actions(&[
                "Monitor slot availability closely",
                "Consider opening additional slots",
                "Prepare backup terminals if needed",
            ]),
        )
    } else if utilization >= MODERATE_UTILIZATION {
        (
            AlertSeverity::Medium,
            format!("Moderate Capacity at Terminal {terminal}"),
            format!("Terminal {terminal} is at {percent:.0}% capacity."),
            actions(&["Continue normal operations", "Watch for capacity trends"]),
        )
    } else {
        return None;
    };

    Some(Alert {
        id: scope.alert_id(AlertKind::Capacity),
        kind: AlertKind::Capacity,
        severity,
        title,
        message,
        recommended_actions: recommended,
        evidence: serde_json::json!({
            "utilization": round3(utilization),
            "remaining_slots": remaining,
            "total_capacity": capacity.total_capacity,
        }),
    })
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
}

/// Counts per kind, and per severity with every level present.
pub fn summarize_alerts(alerts: &[Alert]) -> AlertSummary {
    let mut summary = AlertSummary {
        by_type: BTreeMap::new(),
        by_severity: AlertSeverity::ALL
            .iter()
            .map(|severity| (severity.as_str().to_owned(), 0))
            .collect(),
    };
    for alert in alerts {
        *summary.by_type.entry(alert.kind.as_str().to_owned()).or_default() += 1;
        *summary.by_severity.entry(alert.severity.as_str().to_owned()).or_default() += 1;
    }
    summary
}

fn actions(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
