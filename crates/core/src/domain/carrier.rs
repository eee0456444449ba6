use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarrierId(pub String);

impl CarrierId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a carrier's booking history over an observation window.
///
/// Produced by the carrier service (or derived from booking history on the
/// fallback path) and never mutated by the scoring code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierStatistics {
    pub total_bookings: u32,
    pub completed_bookings: u32,
    pub cancelled_bookings: u32,
    pub no_shows: u32,
    pub late_arrivals: u32,
    pub avg_delay_minutes: f64,
    pub avg_dwell_minutes: Option<f64>,
    pub anomaly_count: u32,
    pub window_days: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl Tier {
    pub const A_THRESHOLD: f64 = 85.0;
    pub const B_THRESHOLD: f64 = 70.0;
    pub const C_THRESHOLD: f64 = 50.0;

    /// Closed-open bands: 85 is A, 84.999 is B.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::A_THRESHOLD {
            Self::A
        } else if score >= Self::B_THRESHOLD {
            Self::B
        } else if score >= Self::C_THRESHOLD {
            Self::C
        } else {
            Self::D
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub completion: f64,
    pub punctuality: f64,
    pub no_show: f64,
    pub anomaly: f64,
    pub dwell_efficiency: f64,
}

/// Rates in percent, rounded to one decimal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_bookings: u32,
    pub completion_rate: f64,
    pub on_time_rate: f64,
    pub no_show_rate: f64,
    pub avg_delay_minutes: f64,
    pub anomaly_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub tier: Tier,
    pub components: ComponentScores,
    pub reasons: Vec<String>,
    pub confidence: f64,
    pub stats_summary: StatsSummary,
}

impl ScoreResult {
    /// Applies upper bounds to score and confidence, keeping the tier consistent
    /// with the bounded score.
    pub fn capped(mut self, max_score: f64, max_confidence: f64) -> Self {
        self.score = self.score.min(max_score);
        self.confidence = self.confidence.min(max_confidence);
        self.tier = Tier::from_score(self.score);
        self
    }
}
