use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::carrier::{CarrierId, CarrierStatistics};
use portgate_core::domain::operations::{
    AnomalyFilter, AnomalyRecord, AnomalySeverity, BookingRecord, BookingStatus, TrafficForecast,
    TrafficPoint,
};
use portgate_core::domain::slot::SlotCandidate;
use portgate_core::ledger::{AuditFilter, LedgerRecord};

use crate::error::UpstreamError;
use crate::pool::{list_field, ServicePool};
use crate::{AnomalyService, AuditLedger, BookingService, CarrierService, SlotService, TrafficModel};

pub struct HttpCarrierService {
    pool: ServicePool,
}

impl HttpCarrierService {
    pub fn new(pool: ServicePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CarrierService for HttpCarrierService {
    async fn carrier_stats(
        &self,
        carrier_id: &CarrierId,
        window_days: u32,
        caller: &CallerContext,
    ) -> Result<CarrierStatistics, UpstreamError> {
        let body = self
            .pool
            .get_json(
                &["carriers", carrier_id.as_str(), "stats"],
                &[("window_days", window_days.to_string())],
                caller,
                &format!("carrier {carrier_id}"),
            )
            .await?;
        let wire: StatsWire = decode(body)?;
        Ok(wire.into_statistics(window_days))
    }
}

pub struct HttpBookingService {
    pool: ServicePool,
}

impl HttpBookingService {
    pub fn new(pool: ServicePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingService for HttpBookingService {
    async fn booking_status(
        &self,
        reference: &str,
        caller: &CallerContext,
    ) -> Result<BookingStatus, UpstreamError> {
        let body = self
            .pool
            .get_json(&["bookings", reference], &[], caller, &format!("booking {reference}"))
            .await?;
        let wire: BookingWire = decode(body)?;
        Ok(wire.into_status(reference))
    }

    async fn carrier_bookings(
        &self,
        carrier_id: &CarrierId,
        window_days: u32,
        caller: &CallerContext,
    ) -> Result<Vec<BookingRecord>, UpstreamError> {
        let body = self
            .pool
            .get_json(
                &["bookings"],
                &[("carrierId", carrier_id.to_string()), ("days", window_days.to_string())],
                caller,
                &format!("bookings for carrier {carrier_id}"),
            )
            .await?;

        list_field(body, "bookings")?
            .into_iter()
            .map(|item| -> Result<BookingRecord, UpstreamError> {
                let status = decode::<BookingWire>(item)?.into_status("");
                Ok(BookingRecord { booking_ref: status.booking_ref, status: status.status })
            })
            .collect()
    }

    async fn pending_bookings(
        &self,
        terminal: &str,
        date: NaiveDate,
        caller: &CallerContext,
    ) -> Result<u32, UpstreamError> {
        let body = self
            .pool
            .get_json(
                &["bookings", "summary"],
                &[("terminal", terminal.to_owned()), ("date", date.to_string())],
                caller,
                &format!("booking summary for terminal {terminal}"),
            )
            .await?;
        let wire: SummaryWire = decode(body)?;
        Ok(wire.pending())
    }
}

pub struct HttpSlotService {
    pool: ServicePool,
}

impl HttpSlotService {
    pub fn new(pool: ServicePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotService for HttpSlotService {
    async fn slot_candidates(
        &self,
        terminal: &str,
        date: NaiveDate,
        gate: Option<&str>,
        caller: &CallerContext,
    ) -> Result<Vec<SlotCandidate>, UpstreamError> {
        let mut query = vec![("terminal", terminal.to_owned()), ("date", date.to_string())];
        if let Some(gate) = gate {
            query.push(("gate", gate.to_owned()));
        }

        let body = self
            .pool
            .get_json(&["slots", "availability"], &query, caller, &format!("slots at terminal {terminal}"))
            .await?;

        let mut candidates = Vec::new();
        for item in list_field(body, "slots")? {
            let wire: SlotWire = decode(item)?;
            match wire.into_candidate(terminal) {
                Some(candidate) => candidates.push(candidate),
                None => warn!(
                    event_name = "upstream.slot.skipped",
                    correlation_id = %caller.trace_id,
                    "slot without id or start time skipped"
                ),
            }
        }
        Ok(candidates)
    }
}

pub struct HttpTrafficModel {
    pool: ServicePool,
}

impl HttpTrafficModel {
    pub fn new(pool: ServicePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrafficModel for HttpTrafficModel {
    async fn predict_traffic(
        &self,
        terminal: Option<&str>,
        start: NaiveDateTime,
        horizon_hours: u32,
        caller: &CallerContext,
    ) -> Result<TrafficForecast, UpstreamError> {
        let mut query = vec![
            ("date", start.date().to_string()),
            ("start", start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("hours", horizon_hours.to_string()),
        ];
        if let Some(terminal) = terminal {
            query.push(("terminal", terminal.to_owned()));
        }

        let body =
            self.pool.get_json(&["traffic", "forecast"], &query, caller, "traffic forecast").await?;
        let wire: ForecastWire = decode(body)?;
        Ok(wire.into_forecast(terminal))
    }
}

pub struct HttpAnomalyService {
    pool: ServicePool,
}

impl HttpAnomalyService {
    pub fn new(pool: ServicePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnomalyService for HttpAnomalyService {
    async fn recent_anomalies(
        &self,
        filter: &AnomalyFilter,
        caller: &CallerContext,
    ) -> Result<Vec<AnomalyRecord>, UpstreamError> {
        let mut query =
            vec![("since", filter.since.to_rfc3339()), ("limit", filter.limit.to_string())];
        if let Some(terminal) = &filter.terminal {
            query.push(("terminal", terminal.clone()));
        }
        if let Some(carrier_id) = &filter.carrier_id {
            query.push(("carrierId", carrier_id.to_string()));
        }

        let body = self.pool.get_json(&["anomalies", "recent"], &query, caller, "anomalies").await?;
        list_field(body, "anomalies")?
            .into_iter()
            .map(|item| decode::<AnomalyWire>(item).map(AnomalyWire::into_record))
            .collect()
    }
}

pub struct HttpAuditLedger {
    pool: ServicePool,
}

impl HttpAuditLedger {
    pub fn new(pool: ServicePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLedger for HttpAuditLedger {
    async fn audit_query(
        &self,
        filter: &AuditFilter,
        caller: &CallerContext,
    ) -> Result<Vec<LedgerRecord>, UpstreamError> {
        let mut query = vec![("bookingRef", filter.booking_ref.clone())];
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }

        let body = self
            .pool
            .get_json(
                &["audit", "records"],
                &query,
                caller,
                &format!("audit records for {}", filter.booking_ref),
            )
            .await?;

        let mut records = list_field(body, "records")?
            .into_iter()
            .map(|item| decode::<LedgerWire>(item)?.into_record(&filter.booking_ref))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|record| record.sequence);
        Ok(records)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, UpstreamError> {
    serde_json::from_value(value).map_err(|error| UpstreamError::Decode(error.to_string()))
}

fn count(value: Option<f64>) -> u32 {
    match value {
        Some(value) if value.is_finite() && value > 0.0 => value.round().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339 (offset dropped, wall-clock kept) and the common naive
/// ISO layouts.
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .into_iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_timestamp(raw).map(|naive| naive.and_utc()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatsWire {
    #[serde(alias = "totalBookings")]
    total_bookings: Option<f64>,
    #[serde(alias = "completedBookings")]
    completed_bookings: Option<f64>,
    #[serde(alias = "cancelledBookings")]
    cancelled_bookings: Option<f64>,
    #[serde(alias = "noShows")]
    no_shows: Option<f64>,
    #[serde(alias = "lateArrivals")]
    late_arrivals: Option<f64>,
    #[serde(alias = "avgDelayMinutes")]
    avg_delay_minutes: Option<f64>,
    #[serde(alias = "avgDwellMinutes")]
    avg_dwell_minutes: Option<f64>,
    #[serde(alias = "anomalyCount")]
    anomaly_count: Option<f64>,
}

impl StatsWire {
    fn into_statistics(self, window_days: u32) -> CarrierStatistics {
        CarrierStatistics {
            total_bookings: count(self.total_bookings),
            completed_bookings: count(self.completed_bookings),
            cancelled_bookings: count(self.cancelled_bookings),
            no_shows: count(self.no_shows),
            late_arrivals: count(self.late_arrivals),
            avg_delay_minutes: self.avg_delay_minutes.filter(|value| value.is_finite()).unwrap_or(0.0),
            avg_dwell_minutes: self.avg_dwell_minutes.filter(|value| value.is_finite() && *value > 0.0),
            anomaly_count: count(self.anomaly_count),
            window_days,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct BookingWire {
    #[serde(alias = "bookingRef", alias = "ref", alias = "reference")]
    booking_ref: Option<Value>,
    #[serde(alias = "bookingStatus")]
    status: Option<String>,
    #[serde(alias = "terminalId", alias = "terminal_id")]
    terminal: Option<Value>,
    #[serde(alias = "gateId", alias = "gate_id")]
    gate: Option<Value>,
    #[serde(alias = "slotTime", alias = "timeWindow", alias = "time_window")]
    slot_time: Option<String>,
    #[serde(alias = "lastUpdate", alias = "updatedAt", alias = "updated_at")]
    last_update: Option<String>,
    #[serde(alias = "carrierId")]
    carrier_id: Option<Value>,
}

impl BookingWire {
    fn into_status(self, requested: &str) -> BookingStatus {
        BookingStatus {
            booking_ref: text(self.booking_ref).unwrap_or_else(|| requested.to_owned()),
            status: self
                .status
                .map(|status| status.trim().to_owned())
                .filter(|status| !status.is_empty())
                .unwrap_or_else(|| "unknown".to_owned()),
            terminal: text(self.terminal),
            gate: text(self.gate),
            slot_time: self.slot_time,
            last_update: self.last_update,
            carrier_id: text(self.carrier_id).map(CarrierId::new),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlotWire {
    #[serde(alias = "slotId", alias = "id")]
    slot_id: Option<Value>,
    #[serde(alias = "startTime", alias = "start_time")]
    start: Option<String>,
    #[serde(alias = "endTime", alias = "end_time")]
    end: Option<String>,
    #[serde(alias = "totalCapacity")]
    capacity: Option<f64>,
    #[serde(alias = "remainingCapacity", alias = "available")]
    remaining: Option<f64>,
    terminal: Option<Value>,
    gate: Option<Value>,
}

impl SlotWire {
    fn into_candidate(self, requested_terminal: &str) -> Option<SlotCandidate> {
        let slot_id = text(self.slot_id)?;
        let start = parse_timestamp(self.start.as_deref()?)?;
        let capacity = count(self.capacity);
        let remaining = count(self.remaining).min(capacity);
        let terminal = text(self.terminal).unwrap_or_else(|| requested_terminal.to_owned());

        let mut candidate = SlotCandidate::new(start, terminal, text(self.gate), remaining, capacity)
            .ok()?
            .with_id(slot_id);
        if let Some(end) = self.end.as_deref().and_then(parse_timestamp) {
            candidate = candidate.with_end(end);
        }
        Some(candidate)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastWire {
    #[serde(alias = "points", alias = "predictions")]
    forecast: Vec<PointWire>,
    #[serde(alias = "modelVersion")]
    model_version: Option<String>,
    terminal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PointWire {
    #[serde(alias = "timestamp", alias = "hour", alias = "time")]
    at: Option<String>,
    #[serde(alias = "predicted_volume", alias = "predictedVolume", alias = "value")]
    volume: Option<f64>,
}

impl ForecastWire {
    fn into_forecast(self, requested_terminal: Option<&str>) -> TrafficForecast {
        let points = self
            .forecast
            .into_iter()
            .filter_map(|point| {
                Some(TrafficPoint {
                    at: parse_timestamp(point.at.as_deref()?)?,
                    volume: point.volume.filter(|volume| volume.is_finite())?.max(0.0),
                })
            })
            .collect();

        TrafficForecast {
            terminal: self.terminal.or_else(|| requested_terminal.map(str::to_owned)),
            points,
            model_version: self.model_version,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryWire {
    pending: Option<f64>,
    #[serde(alias = "byStatus")]
    by_status: HashMap<String, f64>,
}

impl SummaryWire {
    fn pending(&self) -> u32 {
        let by_status = self
            .by_status
            .iter()
            .find(|(status, _)| status.eq_ignore_ascii_case("pending"))
            .map(|(_, count)| *count);
        count(self.pending.or(by_status))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnomalyWire {
    id: Option<Value>,
    #[serde(alias = "type", alias = "anomalyType", alias = "anomaly_type")]
    kind: Option<String>,
    severity: Option<Value>,
    #[serde(alias = "detectedAt", alias = "timestamp")]
    detected_at: Option<String>,
    terminal: Option<Value>,
    #[serde(alias = "carrierId")]
    carrier_id: Option<Value>,
    description: Option<String>,
}

impl AnomalyWire {
    fn into_record(self) -> AnomalyRecord {
        AnomalyRecord {
            id: text(self.id).unwrap_or_else(|| "unknown".to_owned()),
            kind: self.kind.unwrap_or_else(|| "unspecified".to_owned()),
            severity: severity(self.severity),
            detected_at: self.detected_at.as_deref().and_then(parse_utc).unwrap_or_else(Utc::now),
            terminal: text(self.terminal),
            carrier_id: text(self.carrier_id).map(CarrierId::new),
            description: self.description,
        }
    }
}

/// Severity arrives either as a label or as a score in [0, 1].
fn severity(value: Option<Value>) -> AnomalySeverity {
    match value {
        Some(Value::String(label)) => match label.trim().to_ascii_lowercase().as_str() {
            "critical" => AnomalySeverity::Critical,
            "high" => AnomalySeverity::High,
            "medium" | "moderate" => AnomalySeverity::Medium,
            _ => AnomalySeverity::Low,
        },
        Some(Value::Number(number)) => match number.as_f64().unwrap_or(0.0) {
            score if score >= 0.85 => AnomalySeverity::Critical,
            score if score >= 0.6 => AnomalySeverity::High,
            score if score >= 0.3 => AnomalySeverity::Medium,
            _ => AnomalySeverity::Low,
        },
        _ => AnomalySeverity::Medium,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LedgerWire {
    #[serde(alias = "bookingRef")]
    booking_ref: Option<String>,
    #[serde(alias = "seq")]
    sequence: Option<u32>,
    action: Option<String>,
    #[serde(alias = "payloadHash")]
    payload_hash: Option<String>,
    #[serde(alias = "prevHash", alias = "previous_hash")]
    prev_hash: Option<String>,
    #[serde(alias = "entryHash", alias = "hash")]
    entry_hash: Option<String>,
    #[serde(alias = "recordedAt", alias = "timestamp")]
    recorded_at: Option<String>,
}

impl LedgerWire {
    fn into_record(self, requested: &str) -> Result<LedgerRecord, UpstreamError> {
        let missing = |field: &str| UpstreamError::Decode(format!("ledger record missing `{field}`"));
        Ok(LedgerRecord {
            booking_ref: self.booking_ref.unwrap_or_else(|| requested.to_owned()),
            sequence: self.sequence.ok_or_else(|| missing("sequence"))?,
            action: self.action.ok_or_else(|| missing("action"))?,
            payload_hash: self.payload_hash.ok_or_else(|| missing("payload_hash"))?,
            prev_hash: self.prev_hash.filter(|hash| !hash.is_empty()),
            entry_hash: self.entry_hash.ok_or_else(|| missing("entry_hash"))?,
            recorded_at: self
                .recorded_at
                .as_deref()
                .and_then(parse_utc)
                .ok_or_else(|| missing("recorded_at"))?,
        })
    }
}
