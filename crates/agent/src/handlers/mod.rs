//! One handler per business domain behind a single `execute` contract.

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime, NaiveTime, Offset, Utc};

use portgate_core::config::AgentsConfig;
use portgate_core::domain::caller::{CallerContext, Role};
use portgate_core::domain::carrier::CarrierId;
use portgate_core::domain::entity::EntityMap;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::result::AgentResult;

use crate::error::HandlerError;

pub mod analytics;
pub mod anomaly;
pub mod assist;
pub mod audit;
pub mod booking;
pub mod carrier;
pub mod slots;
pub mod traffic;

pub use analytics::AnalyticsHandler;
pub use anomaly::AnomalyHandler;
pub use assist::{ClarificationHandler, HelpHandler, PlannedFeatureHandler, SmalltalkHandler};
pub use audit::AuditTrailHandler;
pub use booking::BookingStatusHandler;
pub use carrier::CarrierScoreHandler;
pub use slots::SlotHandler;
pub use traffic::TrafficHandler;

/// Everything a handler may read for one request.
#[derive(Clone, Copy, Debug)]
pub struct HandlerRequest<'a> {
    pub intent: Intent,
    pub entities: &'a EntityMap,
    pub caller: &'a CallerContext,
    /// Wall-clock reference for defaults such as "today".
    pub now: NaiveDateTime,
}

impl HandlerRequest<'_> {
    /// The explicitly requested carrier, else the caller's own.
    pub fn carrier(&self) -> Option<CarrierId> {
        self.entities.carrier_id().or_else(|| self.caller.carrier_scope.clone())
    }

    /// Carrier whose records may be read on behalf of this caller when the
    /// intent itself is not carrier-scoped. Carrier-bound roles only ever see
    /// their own scope, anonymous callers none.
    pub fn visible_carrier(&self) -> Option<CarrierId> {
        match self.caller.role {
            Role::Anon => None,
            role if role.is_carrier_bound() => self.caller.carrier_scope.clone(),
            _ => self.carrier(),
        }
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandlerSettings {
    pub carrier_window_days: u32,
    pub traffic_horizon_hours: u32,
    pub anomaly_lookback_days: u32,
    pub anomaly_limit: u32,
    pub default_slot_time: NaiveTime,
    pub low_availability_ratio: f64,
    /// Local time of the port relative to UTC, for the system clock.
    pub utc_offset: FixedOffset,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            carrier_window_days: 90,
            traffic_horizon_hours: 24,
            anomaly_lookback_days: 7,
            anomaly_limit: 50,
            default_slot_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            low_availability_ratio: 0.30,
            utc_offset: Utc.fix(),
        }
    }
}

impl HandlerSettings {
    pub fn from_config(agents: &AgentsConfig) -> Self {
        let defaults = Self::default();
        Self {
            carrier_window_days: agents.carrier_window_days,
            traffic_horizon_hours: agents.traffic_horizon_hours,
            anomaly_lookback_days: agents.anomaly_lookback_days,
            anomaly_limit: agents.anomaly_limit,
            default_slot_time: agents.slot_time().unwrap_or(defaults.default_slot_time),
            low_availability_ratio: agents.low_availability_ratio,
            utc_offset: agents.utc_offset().unwrap_or(defaults.utc_offset),
        }
    }
}
