//! Carrier reliability scoring.
//!
//! A total function from [`CarrierStatistics`] to [`ScoreResult`]: missing or
//! malformed inputs degrade the components and the confidence, never the call.

use crate::domain::carrier::{CarrierStatistics, ComponentScores, ScoreResult, StatsSummary, Tier};

pub const ALGORITHM_TAG: &str = "deterministic_weighted_scoring@v1";
pub const NO_HISTORY_REASON: &str = "No booking history";

/// Late-arrival rate that still earns a full punctuality score.
const TARGET_ON_TIME_RATE: f64 = 0.90;
const MAX_DELAY_PENALTY: f64 = 20.0;
const DELAY_MINUTES_PER_POINT: f64 = 3.0;
/// No-show rate at which the no-show component reaches zero.
const MAX_NO_SHOW_RATE: f64 = 0.05;
/// Anomaly rate at which the anomaly component reaches zero.
const MAX_ANOMALY_RATE: f64 = 0.10;
const TARGET_DWELL_MINUTES: f64 = 45.0;
const NEUTRAL_DWELL_SCORE: f64 = 50.0;

const HIGH_CONFIDENCE_BOOKINGS: f64 = 50.0;
const LOW_CONFIDENCE_BOOKINGS: f64 = 10.0;

/// Weights for the five score components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight for completion rate (default: 0.30)
    pub completion: f64,
    /// Weight for punctuality (default: 0.25)
    pub punctuality: f64,
    /// Weight for no-show penalty (default: 0.20)
    pub no_show: f64,
    /// Weight for anomaly penalty (default: 0.15)
    pub anomaly: f64,
    /// Weight for dwell efficiency (default: 0.10)
    pub dwell_efficiency: f64,
}

pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    completion: 0.30,
    punctuality: 0.25,
    no_show: 0.20,
    anomaly: 0.15,
    dwell_efficiency: 0.10,
};

impl Default for ScoringWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

#[derive(Debug, Clone, Copy)]
struct Rates {
    total: u32,
    completion: f64,
    late: f64,
    no_show: f64,
    anomaly: f64,
    avg_delay: f64,
    avg_dwell: Option<f64>,
}

impl Rates {
    fn from_stats(stats: &CarrierStatistics) -> Self {
        let total = f64::from(stats.total_bookings);
        let rate = |count: u32| (f64::from(count) / total).clamp(0.0, 1.0);
        Self {
            total: stats.total_bookings,
            completion: rate(stats.completed_bookings),
            late: rate(stats.late_arrivals),
            no_show: rate(stats.no_shows),
            anomaly: rate(stats.anomaly_count),
            avg_delay: non_negative(stats.avg_delay_minutes),
            avg_dwell: stats.avg_dwell_minutes.filter(|dwell| dwell.is_finite() && *dwell > 0.0),
        }
    }
}

/// Carrier score calculator
#[derive(Debug, Clone, Default)]
pub struct CarrierScorer {
    weights: ScoringWeights,
}

impl CarrierScorer {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default() }
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, stats: &CarrierStatistics) -> ScoreResult {
        if stats.total_bookings == 0 {
            return ScoreResult {
                score: 0.0,
                tier: Tier::D,
                components: ComponentScores::default(),
                reasons: vec![NO_HISTORY_REASON.to_owned()],
                confidence: 0.0,
                stats_summary: StatsSummary::default(),
            };
        }

        let rates = Rates::from_stats(stats);
        let components = ComponentScores {
            completion: round2(completion_score(rates.completion)),
            punctuality: round2(punctuality_score(rates.late, rates.avg_delay)),
            no_show: round2(no_show_score(rates.no_show)),
            anomaly: round2(anomaly_score(rates.anomaly)),
            dwell_efficiency: round2(dwell_score(rates.avg_dwell)),
        };

        let weighted = self.weighted_total(&components);
        let score = round2(weighted.clamp(0.0, 100.0));
        let tier = Tier::from_score(score);

        ScoreResult {
            score,
            tier,
            reasons: reasons(tier, &rates, &components),
            components,
            confidence: round2(confidence(stats.total_bookings)),
            stats_summary: summarize(&rates),
        }
    }

    fn weighted_total(&self, components: &ComponentScores) -> f64 {
        components.completion * self.weights.completion
            + components.punctuality * self.weights.punctuality
            + components.no_show * self.weights.no_show
            + components.anomaly * self.weights.anomaly
            + components.dwell_efficiency * self.weights.dwell_efficiency
    }
}

/// Scores with the default weights.
pub fn score(stats: &CarrierStatistics) -> ScoreResult {
    CarrierScorer::new().score(stats)
}

/// Saturating in sample size: 0 at no bookings, 0.5 at 10, 1.0 from 50 on.
pub fn confidence(total_bookings: u32) -> f64 {
    let total = f64::from(total_bookings);
    if total >= HIGH_CONFIDENCE_BOOKINGS {
        1.0
    } else if total >= LOW_CONFIDENCE_BOOKINGS {
        0.5 + (total - LOW_CONFIDENCE_BOOKINGS)
            / (HIGH_CONFIDENCE_BOOKINGS - LOW_CONFIDENCE_BOOKINGS)
            * 0.5
    } else {
        total / LOW_CONFIDENCE_BOOKINGS * 0.5
    }
}

fn completion_score(rate: f64) -> f64 {
    rate * 100.0
}

fn punctuality_score(late_rate: f64, avg_delay: f64) -> f64 {
    let delay_penalty = (avg_delay / DELAY_MINUTES_PER_POINT).min(MAX_DELAY_PENALTY);
    ((1.0 - late_rate) / TARGET_ON_TIME_RATE * 100.0 - delay_penalty).clamp(0.0, 100.0)
}

fn no_show_score(rate: f64) -> f64 {
    (100.0 - rate / MAX_NO_SHOW_RATE * 100.0).max(0.0)
}

fn anomaly_score(rate: f64) -> f64 {
    (100.0 - rate / MAX_ANOMALY_RATE * 100.0).max(0.0)
}

fn dwell_score(avg_dwell: Option<f64>) -> f64 {
    match avg_dwell {
        Some(dwell) => {
            let deviation = (dwell - TARGET_DWELL_MINUTES).abs();
            (100.0 - deviation / TARGET_DWELL_MINUTES * 100.0).max(0.0)
        }
        None => NEUTRAL_DWELL_SCORE,
    }
}

fn reasons(tier: Tier, rates: &Rates, components: &ComponentScores) -> Vec<String> {
    let mut reasons = vec![verdict(tier).to_owned()];

    let completion_pct = rates.completion * 100.0;
    if rates.completion >= 0.95 {
        reasons.push(format!("High completion rate ({completion_pct:.1}%)"));
    } else if rates.completion < 0.85 {
        reasons.push(format!("Low completion rate ({completion_pct:.1}%) - improvement needed"));
    }

    if rates.late > 0.15 {
        reasons.push(format!("Punctuality issues: {:.1}% late arrivals", rates.late * 100.0));
    } else if rates.late < 0.05 && rates.avg_delay < 5.0 {
        reasons.push("Excellent punctuality record".to_owned());
    }

    let no_show_pct = rates.no_show * 100.0;
    if rates.no_show > MAX_NO_SHOW_RATE {
        reasons.push(format!("High no-show rate ({no_show_pct:.1}%) impacts reliability"));
    } else if rates.no_show < 0.02 {
        reasons.push(format!("Excellent reliability with minimal no-shows ({no_show_pct:.1}%)"));
    }

    if rates.anomaly > MAX_ANOMALY_RATE {
        reasons.push(format!(
            "High anomaly rate ({:.1}%) requires investigation",
            rates.anomaly * 100.0
        ));
    }

    if let Some(dwell) = rates.avg_dwell {
        if components.dwell_efficiency >= 80.0 {
            reasons.push(format!("Efficient dwell time ({dwell:.0} min average)"));
        } else if components.dwell_efficiency < 40.0 {
            reasons.push(format!(
                "Dwell time far from target ({dwell:.0} min vs {TARGET_DWELL_MINUTES:.0} min)"
            ));
        }
    }

    let total = rates.total;
    if f64::from(total) < LOW_CONFIDENCE_BOOKINGS {
        reasons.push(format!(
            "Score based on limited data ({total} bookings) - more history needed for confidence"
        ));
    } else if f64::from(total) >= HIGH_CONFIDENCE_BOOKINGS {
        reasons.push(format!("Score based on substantial history ({total} bookings)"));
    }

    reasons
}

fn verdict(tier: Tier) -> &'static str {
    match tier {
        Tier::A => "Excellent overall performance",
        Tier::B => "Good performance with room for improvement",
        Tier::C => "Acceptable performance but needs attention",
        Tier::D => "Performance needs significant improvement",
    }
}

fn summarize(rates: &Rates) -> StatsSummary {
    StatsSummary {
        total_bookings: rates.total,
        completion_rate: round1(rates.completion * 100.0),
        on_time_rate: round1((1.0 - rates.late) * 100.0),
        no_show_rate: round1(rates.no_show * 100.0),
        avg_delay_minutes: round1(rates.avg_delay),
        anomaly_rate: round1(rates.anomaly * 100.0),
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{confidence, score, CarrierScorer, ScoringWeights, NO_HISTORY_REASON};
    use crate::domain::carrier::{CarrierStatistics, Tier};

    fn stats(total: u32, completed: u32, no_shows: u32, late: u32) -> CarrierStatistics {
        CarrierStatistics {
            total_bookings: total,
            completed_bookings: completed,
            no_shows,
            late_arrivals: late,
            ..CarrierStatistics::default()
        }
    }

    #[test]
    fn empty_history_returns_sentinel_result() {
        let result = score(&CarrierStatistics { avg_delay_minutes: 12.0, ..Default::default() });

        assert_eq!(result.score, 0.0);
        assert_eq!(result.tier, Tier::D);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.reasons, vec![NO_HISTORY_REASON.to_owned()]);
    }

    #[test]
    fn reliable_carrier_reaches_tier_a() {
        let result = score(&CarrierStatistics {
            total_bookings: 100,
            completed_bookings: 98,
            no_shows: 0,
            late_arrivals: 3,
            avg_delay_minutes: 2.5,
            anomaly_count: 1,
            ..CarrierStatistics::default()
        });

        assert!(result.score >= 85.0, "score was {}", result.score);
        assert_eq!(result.tier, Tier::A);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.components.completion, 98.0);
        assert_eq!(result.components.punctuality, 100.0);
        assert_eq!(result.components.anomaly, 90.0);
        assert_eq!(result.components.dwell_efficiency, 50.0);
        assert_eq!(result.reasons[0], "Excellent overall performance");
        assert_eq!(
            result.reasons.last().map(String::as_str),
            Some("Score based on substantial history (100 bookings)")
        );
    }

    #[test]
    fn score_is_monotonic_in_completion_and_no_shows() {
        let mut previous = f64::MIN;
        for completed in (0..=100).step_by(5) {
            let current = score(&stats(100, completed, 2, 5)).score;
            assert!(current >= previous, "completion {completed}: {current} < {previous}");
            previous = current;
        }

        let mut previous = f64::MAX;
        for no_shows in 0..=20 {
            let current = score(&stats(100, 80, no_shows, 5)).score;
            assert!(current <= previous, "no-shows {no_shows}: {current} > {previous}");
            previous = current;
        }
    }

    #[test]
    fn confidence_saturates_with_sample_size() {
        assert_eq!(confidence(0), 0.0);
        assert_eq!(confidence(5), 0.25);
        assert_eq!(confidence(10), 0.5);
        assert_eq!(confidence(30), 0.75);
        assert_eq!(confidence(50), 1.0);
        assert_eq!(confidence(5_000), 1.0);
    }

    #[test]
    fn confidence_does_not_depend_on_score() {
        let strong = score(&stats(20, 20, 0, 0));
        let weak = score(&stats(20, 5, 8, 10));

        assert!(strong.score > weak.score);
        assert_eq!(strong.confidence, weak.confidence);
    }

    #[test]
    fn malformed_inputs_degrade_instead_of_failing() {
        let result = score(&CarrierStatistics {
            total_bookings: 10,
            completed_bookings: 25,
            late_arrivals: 40,
            avg_delay_minutes: f64::NAN,
            avg_dwell_minutes: Some(-3.0),
            ..CarrierStatistics::default()
        });

        assert!(result.score.is_finite());
        assert!((0.0..=100.0).contains(&result.score));
        assert_eq!(result.components.completion, 100.0);
        assert_eq!(result.components.punctuality, 0.0);
        assert_eq!(result.components.dwell_efficiency, 50.0);
    }

    #[test]
    fn dwell_band_rewards_target_and_penalizes_both_directions() {
        let at = |dwell: f64| {
            score(&CarrierStatistics {
                avg_dwell_minutes: Some(dwell),
                ..stats(60, 60, 0, 0)
            })
            .components
            .dwell_efficiency
        };

        assert_eq!(at(45.0), 100.0);
        assert_eq!(at(22.5), 50.0);
        assert_eq!(at(67.5), 50.0);
        assert_eq!(at(120.0), 0.0);
    }

    #[test]
    fn reasons_follow_component_weight_order() {
        let result = score(&CarrierStatistics {
            total_bookings: 40,
            completed_bookings: 28,
            no_shows: 4,
            late_arrivals: 8,
            anomaly_count: 6,
            avg_delay_minutes: 14.0,
            ..CarrierStatistics::default()
        });

        assert_eq!(result.tier, Tier::D);
        assert_eq!(
            result.reasons,
            vec![
                "Performance needs significant improvement".to_owned(),
                "Low completion rate (70.0%) - improvement needed".to_owned(),
                "Punctuality issues: 20.0% late arrivals".to_owned(),
                "High no-show rate (10.0%) impacts reliability".to_owned(),
                "High anomaly rate (15.0%) requires investigation".to_owned(),
            ]
        );
    }

    #[test]
    fn limited_history_is_called_out() {
        let result = score(&stats(4, 4, 0, 0));

        assert_eq!(result.confidence, 0.2);
        assert!(result
            .reasons
            .iter()
            .any(|reason| reason.starts_with("Score based on limited data (4 bookings)")));
    }

    #[test]
    fn custom_weights_change_the_total() {
        let completion_only = CarrierScorer::with_weights(ScoringWeights {
            completion: 1.0,
            punctuality: 0.0,
            no_show: 0.0,
            anomaly: 0.0,
            dwell_efficiency: 0.0,
        });

        assert_eq!(completion_only.score(&stats(10, 7, 0, 0)).score, 70.0);
    }
}
