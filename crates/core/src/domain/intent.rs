use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed catalog of request intents. `Unknown` is a valid terminal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BookingStatus,
    CarrierScore,
    SlotAvailability,
    SlotRecommendation,
    DriverNoshowRisk,
    PassageHistory,
    TrafficForecast,
    AnomalyDetection,
    BlockchainAudit,
    AnalyticsStressIndex,
    AnalyticsAlerts,
    Help,
    Smalltalk,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 14] = [
        Intent::BookingStatus,
        Intent::CarrierScore,
        Intent::SlotAvailability,
        Intent::SlotRecommendation,
        Intent::DriverNoshowRisk,
        Intent::PassageHistory,
        Intent::TrafficForecast,
        Intent::AnomalyDetection,
        Intent::BlockchainAudit,
        Intent::AnalyticsStressIndex,
        Intent::AnalyticsAlerts,
        Intent::Help,
        Intent::Smalltalk,
        Intent::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookingStatus => "booking_status",
            Self::CarrierScore => "carrier_score",
            Self::SlotAvailability => "slot_availability",
            Self::SlotRecommendation => "slot_recommendation",
            Self::DriverNoshowRisk => "driver_noshow_risk",
            Self::PassageHistory => "passage_history",
            Self::TrafficForecast => "traffic_forecast",
            Self::AnomalyDetection => "anomaly_detection",
            Self::BlockchainAudit => "blockchain_audit",
            Self::AnalyticsStressIndex => "analytics_stress_index",
            Self::AnalyticsAlerts => "analytics_alerts",
            Self::Help => "help",
            Self::Smalltalk => "smalltalk",
            Self::Unknown => "unknown",
        }
    }

    /// Conversational intents that never seed a follow-up.
    pub fn is_generic(self) -> bool {
        matches!(self, Self::Help | Self::Smalltalk | Self::Unknown)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownIntentName(pub String);

impl fmt::Display for UnknownIntentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported intent `{}`", self.0)
    }
}

impl std::error::Error for UnknownIntentName {}

impl FromStr for Intent {
    type Err = UnknownIntentName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| UnknownIntentName(value.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Slot_Availability".parse::<Intent>(), Ok(Intent::SlotAvailability));
        assert_eq!(" CARRIER_SCORE ".parse::<Intent>(), Ok(Intent::CarrierScore));
        assert_eq!("analytics_alerts".parse::<Intent>(), Ok(Intent::AnalyticsAlerts));
        assert!("analytics_what_if".parse::<Intent>().is_err());
    }

    #[test]
    fn names_round_trip_through_serde() {
        for intent in Intent::ALL {
            let encoded = serde_json::to_string(&intent).expect("serialize");
            assert_eq!(encoded, format!("\"{}\"", intent.as_str()));
        }
    }

    #[test]
    fn generic_intents_are_help_smalltalk_unknown() {
        let generic: Vec<Intent> = Intent::ALL.into_iter().filter(|i| i.is_generic()).collect();
        assert_eq!(generic, vec![Intent::Help, Intent::Smalltalk, Intent::Unknown]);
    }
}
