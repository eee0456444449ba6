use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tokio::sync::RwLock;

use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::carrier::{CarrierId, CarrierStatistics};
use portgate_core::domain::operations::{
    AnomalyFilter, AnomalyRecord, BookingRecord, BookingStatus, TrafficForecast, TrafficPoint,
};
use portgate_core::domain::slot::SlotCandidate;
use portgate_core::ledger::{AuditFilter, LedgerRecord};

use crate::error::UpstreamError;
use crate::{AnomalyService, AuditLedger, BookingService, CarrierService, SlotService, TrafficModel};

/// Names one collaborator contract, for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collaborator {
    Carrier,
    BookingStatus,
    BookingHistory,
    BookingSummary,
    Slot,
    Traffic,
    Anomaly,
    Ledger,
}

/// In-process stand-in for every collaborator. Seed with the `with_*`
/// builders; inject failures with `with_failure` or `fail`.
#[derive(Default)]
pub struct InMemoryPort {
    carrier_stats: RwLock<HashMap<String, CarrierStatistics>>,
    bookings: RwLock<HashMap<String, BookingStatus>>,
    carrier_history: RwLock<HashMap<String, Vec<BookingRecord>>>,
    slots: RwLock<Vec<SlotCandidate>>,
    traffic: RwLock<Vec<(Option<String>, TrafficPoint)>>,
    anomalies: RwLock<Vec<AnomalyRecord>>,
    ledger: RwLock<HashMap<String, Vec<LedgerRecord>>>,
    failures: RwLock<HashMap<Collaborator, UpstreamError>>,
}

impl InMemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_carrier_stats(mut self, carrier_id: &str, stats: CarrierStatistics) -> Self {
        self.carrier_stats.get_mut().insert(carrier_id.to_owned(), stats);
        self
    }

    pub fn with_booking(mut self, status: BookingStatus) -> Self {
        self.bookings.get_mut().insert(status.booking_ref.clone(), status);
        self
    }

    pub fn with_carrier_history(mut self, carrier_id: &str, records: Vec<BookingRecord>) -> Self {
        self.carrier_history.get_mut().insert(carrier_id.to_owned(), records);
        self
    }

    pub fn with_slot(mut self, slot: SlotCandidate) -> Self {
        self.slots.get_mut().push(slot);
        self
    }

    pub fn with_traffic_point(mut self, terminal: Option<&str>, point: TrafficPoint) -> Self {
        self.traffic.get_mut().push((terminal.map(str::to_owned), point));
        self
    }

    pub fn with_anomaly(mut self, record: AnomalyRecord) -> Self {
        self.anomalies.get_mut().push(record);
        self
    }

    pub fn with_ledger_records(mut self, booking_ref: &str, records: Vec<LedgerRecord>) -> Self {
        self.ledger.get_mut().insert(booking_ref.to_owned(), records);
        self
    }

    pub fn with_failure(mut self, collaborator: Collaborator, error: UpstreamError) -> Self {
        self.failures.get_mut().insert(collaborator, error);
        self
    }

    pub async fn fail(&self, collaborator: Collaborator, error: UpstreamError) {
        self.failures.write().await.insert(collaborator, error);
    }

    pub async fn recover(&self, collaborator: Collaborator) {
        self.failures.write().await.remove(&collaborator);
    }

    async fn check(&self, collaborator: Collaborator) -> Result<(), UpstreamError> {
        match self.failures.read().await.get(&collaborator) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CarrierService for InMemoryPort {
    async fn carrier_stats(
        &self,
        carrier_id: &CarrierId,
        window_days: u32,
        _caller: &CallerContext,
    ) -> Result<CarrierStatistics, UpstreamError> {
        self.check(Collaborator::Carrier).await?;
        let stats = self.carrier_stats.read().await;
        stats
            .get(carrier_id.as_str())
            .cloned()
            .map(|stats| CarrierStatistics { window_days, ..stats })
            .ok_or_else(|| UpstreamError::not_found(format!("carrier {carrier_id}")))
    }
}

#[async_trait]
impl BookingService for InMemoryPort {
    async fn booking_status(
        &self,
        reference: &str,
        _caller: &CallerContext,
    ) -> Result<BookingStatus, UpstreamError> {
        self.check(Collaborator::BookingStatus).await?;
        let bookings = self.bookings.read().await;
        bookings
            .get(reference)
            .cloned()
            .ok_or_else(|| UpstreamError::not_found(format!("booking {reference}")))
    }

    async fn carrier_bookings(
        &self,
        carrier_id: &CarrierId,
        _window_days: u32,
        _caller: &CallerContext,
    ) -> Result<Vec<BookingRecord>, UpstreamError> {
        self.check(Collaborator::BookingHistory).await?;
        let history = self.carrier_history.read().await;
        Ok(history.get(carrier_id.as_str()).cloned().unwrap_or_default())
    }

    async fn pending_bookings(
        &self,
        terminal: &str,
        date: NaiveDate,
        _caller: &CallerContext,
    ) -> Result<u32, UpstreamError> {
        self.check(Collaborator::BookingSummary).await?;
        let day = date.to_string();
        let bookings = self.bookings.read().await;
        let pending = bookings
            .values()
            .filter(|booking| booking.status.eq_ignore_ascii_case("pending"))
            .filter(|booking| {
                booking.terminal.as_deref().is_some_and(|own| own.eq_ignore_ascii_case(terminal))
            })
            .filter(|booking| booking.slot_time.as_deref().is_some_and(|slot| slot.starts_with(&day)))
            .count();
        Ok(u32::try_from(pending).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl SlotService for InMemoryPort {
    async fn slot_candidates(
        &self,
        terminal: &str,
        date: NaiveDate,
        gate: Option<&str>,
        _caller: &CallerContext,
    ) -> Result<Vec<SlotCandidate>, UpstreamError> {
        self.check(Collaborator::Slot).await?;
        let slots = self.slots.read().await;
        Ok(slots
            .iter()
            .filter(|slot| slot.terminal.eq_ignore_ascii_case(terminal))
            .filter(|slot| slot.start.date() == date)
            .filter(|slot| match gate {
                Some(gate) => slot.gate.as_deref().is_some_and(|own| own.eq_ignore_ascii_case(gate)),
                None => true,
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TrafficModel for InMemoryPort {
    async fn predict_traffic(
        &self,
        terminal: Option<&str>,
        start: NaiveDateTime,
        horizon_hours: u32,
        _caller: &CallerContext,
    ) -> Result<TrafficForecast, UpstreamError> {
        self.check(Collaborator::Traffic).await?;
        let end = start + Duration::hours(i64::from(horizon_hours));
        let traffic = self.traffic.read().await;
        let mut points: Vec<TrafficPoint> = traffic
            .iter()
            .filter(|(point_terminal, _)| match (terminal, point_terminal) {
                (Some(wanted), Some(own)) => own.eq_ignore_ascii_case(wanted),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|(_, point)| point.clone())
            .filter(|point| point.at >= start && point.at < end)
            .collect();
        points.sort_by_key(|point| point.at);

        Ok(TrafficForecast {
            terminal: terminal.map(str::to_owned),
            points,
            model_version: Some("in-memory".to_owned()),
        })
    }
}

#[async_trait]
impl AnomalyService for InMemoryPort {
    async fn recent_anomalies(
        &self,
        filter: &AnomalyFilter,
        _caller: &CallerContext,
    ) -> Result<Vec<AnomalyRecord>, UpstreamError> {
        self.check(Collaborator::Anomaly).await?;
        let anomalies = self.anomalies.read().await;
        let mut matching: Vec<AnomalyRecord> = anomalies
            .iter()
            .filter(|record| record.detected_at >= filter.since)
            .filter(|record| match &filter.terminal {
                Some(terminal) => record
                    .terminal
                    .as_deref()
                    .is_some_and(|own| own.eq_ignore_ascii_case(terminal)),
                None => true,
            })
            .filter(|record| match &filter.carrier_id {
                Some(carrier_id) => record.carrier_id.as_ref() == Some(carrier_id),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.detected_at.cmp(&left.detected_at));
        matching.truncate(usize::try_from(filter.limit).unwrap_or(usize::MAX));
        Ok(matching)
    }
}

#[async_trait]
impl AuditLedger for InMemoryPort {
    async fn audit_query(
        &self,
        filter: &AuditFilter,
        _caller: &CallerContext,
    ) -> Result<Vec<LedgerRecord>, UpstreamError> {
        self.check(Collaborator::Ledger).await?;
        let ledger = self.ledger.read().await;
        let mut records = ledger.get(&filter.booking_ref).cloned().unwrap_or_default();
        if let Some(limit) = filter.limit {
            records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use portgate_core::domain::caller::{CallerContext, Role};
    use portgate_core::domain::carrier::{CarrierId, CarrierStatistics};
    use portgate_core::domain::operations::{
        AnomalyFilter, AnomalyRecord, AnomalySeverity, BookingStatus, TrafficPoint,
    };
    use portgate_core::domain::slot::SlotCandidate;

    use crate::error::UpstreamError;
    use crate::memory::{Collaborator, InMemoryPort};
    use crate::{AnomalyService, BookingService, CarrierService, SlotService, TrafficModel};

    fn caller() -> CallerContext {
        CallerContext::new(Role::Operator, "trace-mem")
    }

    #[tokio::test]
    async fn carrier_stats_miss_is_not_found() {
        let port = InMemoryPort::new().with_carrier_stats(
            "7",
            CarrierStatistics { total_bookings: 10, completed_bookings: 9, ..Default::default() },
        );

        let found = port.carrier_stats(&CarrierId::new("7"), 30, &caller()).await.expect("found");
        assert_eq!(found.total_bookings, 10);
        assert_eq!(found.window_days, 30);

        let missing = port.carrier_stats(&CarrierId::new("8"), 30, &caller()).await;
        assert!(matches!(missing, Err(UpstreamError::NotFound { .. })));
    }

    #[tokio::test]
    async fn injected_failures_apply_until_recovered() {
        let port = InMemoryPort::new()
            .with_failure(Collaborator::Carrier, UpstreamError::EndpointMissing { status: 501 });

        let failed = port.carrier_stats(&CarrierId::new("7"), 30, &caller()).await;
        assert_eq!(failed, Err(UpstreamError::EndpointMissing { status: 501 }));

        port.recover(Collaborator::Carrier).await;
        port.fail(Collaborator::Slot, UpstreamError::Timeout).await;

        let recovered = port.carrier_stats(&CarrierId::new("7"), 30, &caller()).await;
        assert!(matches!(recovered, Err(UpstreamError::NotFound { .. })));
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
        assert_eq!(
            port.slot_candidates("A", day, None, &caller()).await,
            Err(UpstreamError::Timeout)
        );
    }

    #[tokio::test]
    async fn pending_bookings_count_one_terminal_day() {
        let booking = |reference: &str, status: &str, terminal: &str, slot: &str| BookingStatus {
            booking_ref: reference.to_owned(),
            status: status.to_owned(),
            terminal: Some(terminal.to_owned()),
            gate: None,
            slot_time: Some(slot.to_owned()),
            last_update: None,
            carrier_id: None,
        };
        let port = InMemoryPort::new()
            .with_booking(booking("REF1", "pending", "A", "2026-03-02T09:00:00"))
            .with_booking(booking("REF2", "Pending", "a", "2026-03-02T14:00:00"))
            .with_booking(booking("REF3", "confirmed", "A", "2026-03-02T09:00:00"))
            .with_booking(booking("REF4", "pending", "B", "2026-03-02T09:00:00"))
            .with_booking(booking("REF5", "pending", "A", "2026-03-03T09:00:00"));
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");

        assert_eq!(port.pending_bookings("A", day, &caller()).await, Ok(2));

        port.fail(Collaborator::BookingSummary, UpstreamError::Timeout).await;
        assert_eq!(port.pending_bookings("A", day, &caller()).await, Err(UpstreamError::Timeout));
    }

    #[tokio::test]
    async fn slots_filter_by_terminal_date_and_gate() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
        let at = |hour| day.and_hms_opt(hour, 0, 0).expect("time");
        let port = InMemoryPort::new()
            .with_slot(SlotCandidate::new(at(8), "A", Some("G1".to_owned()), 3, 10).expect("slot"))
            .with_slot(SlotCandidate::new(at(9), "A", Some("G2".to_owned()), 3, 10).expect("slot"))
            .with_slot(SlotCandidate::new(at(9), "B", Some("G1".to_owned()), 3, 10).expect("slot"))
            .with_slot(
                SlotCandidate::new(at(9) + Duration::days(1), "A", None, 3, 10).expect("slot"),
            );

        let all_a = port.slot_candidates("a", day, None, &caller()).await.expect("slots");
        assert_eq!(all_a.len(), 2);

        let gate_two = port.slot_candidates("A", day, Some("g2"), &caller()).await.expect("slots");
        assert_eq!(gate_two.len(), 1);
        assert_eq!(gate_two[0].start, at(9));
    }

    #[tokio::test]
    async fn traffic_window_is_half_open_and_sorted() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
        let at = |hour| day.and_hms_opt(hour, 0, 0).expect("time");
        let port = InMemoryPort::new()
            .with_traffic_point(Some("A"), TrafficPoint { at: at(10), volume: 40.0 })
            .with_traffic_point(Some("A"), TrafficPoint { at: at(8), volume: 20.0 })
            .with_traffic_point(Some("A"), TrafficPoint { at: at(12), volume: 90.0 })
            .with_traffic_point(Some("B"), TrafficPoint { at: at(9), volume: 70.0 });

        let forecast = port.predict_traffic(Some("A"), at(8), 4, &caller()).await.expect("forecast");

        let hours: Vec<_> = forecast.points.iter().map(|point| point.at).collect();
        assert_eq!(hours, vec![at(8), at(10)]);
    }

    #[tokio::test]
    async fn anomalies_are_newest_first_and_limited() {
        let base = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().expect("timestamp");
        let record = |id: &str, offset: i64| AnomalyRecord {
            id: id.to_owned(),
            kind: "late_arrival_cluster".to_owned(),
            severity: AnomalySeverity::Medium,
            detected_at: base + Duration::hours(offset),
            terminal: Some("A".to_owned()),
            carrier_id: None,
            description: None,
        };
        let port = InMemoryPort::new()
            .with_anomaly(record("old", -48))
            .with_anomaly(record("a", 1))
            .with_anomaly(record("b", 2))
            .with_anomaly(record("c", 3));

        let filter = AnomalyFilter {
            since: base - Duration::hours(1),
            limit: 2,
            terminal: None,
            carrier_id: None,
        };
        let found = port.recent_anomalies(&filter, &caller()).await.expect("anomalies");

        let ids: Vec<&str> = found.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
