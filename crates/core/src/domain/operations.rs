use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::carrier::{CarrierId, CarrierStatistics};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingStatus {
    pub booking_ref: String,
    pub status: String,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub slot_time: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub carrier_id: Option<CarrierId>,
}

/// One entry of a carrier's booking history, as used by the scoring fallback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_ref: String,
    pub status: String,
}

/// Derives statistics from raw booking history when the carrier service has no
/// aggregated view. Punctuality, dwell and anomaly signals are not available
/// from booking status alone and stay at zero.
pub fn statistics_from_bookings(bookings: &[BookingRecord], window_days: u32) -> CarrierStatistics {
    let mut stats = CarrierStatistics {
        total_bookings: u32::try_from(bookings.len()).unwrap_or(u32::MAX),
        window_days,
        ..CarrierStatistics::default()
    };

    for booking in bookings {
        match booking.status.trim().to_ascii_lowercase().as_str() {
            "completed" | "consumed" => stats.completed_bookings += 1,
            "no_show" | "no-show" | "noshow" => stats.no_shows += 1,
            "cancelled" | "canceled" => stats.cancelled_bookings += 1,
            _ => {}
        }
    }

    stats
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficPoint {
    pub at: NaiveDateTime,
    pub volume: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficForecast {
    #[serde(default)]
    pub terminal: Option<String>,
    pub points: Vec<TrafficPoint>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl TrafficForecast {
    /// Highest-volume point; the earliest wins on equal volume.
    pub fn peak(&self) -> Option<&TrafficPoint> {
        self.points.iter().fold(None, |best: Option<&TrafficPoint>, point| match best {
            Some(current) if current.volume >= point.volume => Some(current),
            _ => Some(point),
        })
    }

    pub fn total_volume(&self) -> f64 {
        self.points.iter().map(|point| point.volume).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    pub const ALL: [AnomalySeverity; 4] = [
        AnomalySeverity::Low,
        AnomalySeverity::Medium,
        AnomalySeverity::High,
        AnomalySeverity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: String,
    pub kind: String,
    pub severity: AnomalySeverity,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub carrier_id: Option<CarrierId>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFilter {
    pub since: DateTime<Utc>,
    pub limit: u32,
    pub terminal: Option<String>,
    pub carrier_id: Option<CarrierId>,
}
