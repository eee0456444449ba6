//! Contracts for the services the decision core consumes, with HTTP
//! implementations over bounded connection pools and in-memory substitutes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use portgate_core::config::ServicesConfig;
use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::carrier::{CarrierId, CarrierStatistics};
use portgate_core::domain::operations::{
    AnomalyFilter, AnomalyRecord, BookingRecord, BookingStatus, TrafficForecast,
};
use portgate_core::domain::slot::SlotCandidate;
use portgate_core::ledger::{AuditFilter, LedgerRecord};

pub mod error;
pub mod http;
pub mod memory;
pub mod pool;

pub use error::UpstreamError;
pub use memory::{Collaborator, InMemoryPort};
pub use pool::{PoolSettings, ServicePool};

#[async_trait]
pub trait CarrierService: Send + Sync {
    async fn carrier_stats(
        &self,
        carrier_id: &CarrierId,
        window_days: u32,
        caller: &CallerContext,
    ) -> Result<CarrierStatistics, UpstreamError>;
}

#[async_trait]
pub trait BookingService: Send + Sync {
    async fn booking_status(
        &self,
        reference: &str,
        caller: &CallerContext,
    ) -> Result<BookingStatus, UpstreamError>;

    /// Raw booking history used to derive statistics when the carrier
    /// service cannot answer.
    async fn carrier_bookings(
        &self,
        carrier_id: &CarrierId,
        window_days: u32,
        caller: &CallerContext,
    ) -> Result<Vec<BookingRecord>, UpstreamError>;

    /// Bookings at a terminal on a day that still await confirmation.
    async fn pending_bookings(
        &self,
        terminal: &str,
        date: NaiveDate,
        caller: &CallerContext,
    ) -> Result<u32, UpstreamError>;
}

#[async_trait]
pub trait SlotService: Send + Sync {
    async fn slot_candidates(
        &self,
        terminal: &str,
        date: NaiveDate,
        gate: Option<&str>,
        caller: &CallerContext,
    ) -> Result<Vec<SlotCandidate>, UpstreamError>;
}

/// Opaque traffic prediction model.
#[async_trait]
pub trait TrafficModel: Send + Sync {
    async fn predict_traffic(
        &self,
        terminal: Option<&str>,
        start: NaiveDateTime,
        horizon_hours: u32,
        caller: &CallerContext,
    ) -> Result<TrafficForecast, UpstreamError>;
}

#[async_trait]
pub trait AnomalyService: Send + Sync {
    async fn recent_anomalies(
        &self,
        filter: &AnomalyFilter,
        caller: &CallerContext,
    ) -> Result<Vec<AnomalyRecord>, UpstreamError>;
}

/// Read-only access to the booking audit chain.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    async fn audit_query(
        &self,
        filter: &AuditFilter,
        caller: &CallerContext,
    ) -> Result<Vec<LedgerRecord>, UpstreamError>;
}

/// Injected collaborator handles shared by every handler.
#[derive(Clone)]
pub struct Collaborators {
    pub carriers: Arc<dyn CarrierService>,
    pub bookings: Arc<dyn BookingService>,
    pub slots: Arc<dyn SlotService>,
    pub traffic: Arc<dyn TrafficModel>,
    pub anomalies: Arc<dyn AnomalyService>,
    pub ledger: Arc<dyn AuditLedger>,
}

impl Collaborators {
    pub fn http(services: &ServicesConfig) -> Result<Self, UpstreamError> {
        let settings = PoolSettings::from_config(services);
        let booking_pool = ServicePool::new("booking", &services.booking_url, settings.clone())?;
        let analytics_pool =
            ServicePool::new("analytics", &services.analytics_url, settings.clone())?;

        Ok(Self {
            carriers: Arc::new(http::HttpCarrierService::new(ServicePool::new(
                "carrier",
                &services.carrier_url,
                settings.clone(),
            )?)),
            bookings: Arc::new(http::HttpBookingService::new(booking_pool)),
            slots: Arc::new(http::HttpSlotService::new(ServicePool::new(
                "slot",
                &services.slot_url,
                settings.clone(),
            )?)),
            traffic: Arc::new(http::HttpTrafficModel::new(analytics_pool.clone())),
            anomalies: Arc::new(http::HttpAnomalyService::new(analytics_pool)),
            ledger: Arc::new(http::HttpAuditLedger::new(ServicePool::new(
                "ledger",
                &services.ledger_url,
                settings,
            )?)),
        })
    }

    /// Every contract served by one shared in-memory store.
    pub fn in_memory(port: Arc<InMemoryPort>) -> Self {
        Self {
            carriers: port.clone(),
            bookings: port.clone(),
            slots: port.clone(),
            traffic: port.clone(),
            anomalies: port.clone(),
            ledger: port,
        }
    }
}
