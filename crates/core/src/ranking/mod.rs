//! Slot ranking for arrival recommendations.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::slot::{RankedSlot, RecommendationResult, SlotCandidate, Strategy};

pub const ALGORITHM_TAG: &str = "deterministic_slot_ranking@v1";

/// Carriers scoring below this get the buffer strategy.
pub const LOW_CARRIER_SCORE_THRESHOLD: f64 = 60.0;
const BUFFER_WINDOW_MINUTES: f64 = 60.0;
const CLOSE_WINDOW_MINUTES: f64 = 30.0;
const MINUTES_PER_PROXIMITY_POINT: f64 = 3.0;
const LATE_SLOT_FACTOR: f64 = 0.5;
const NEUTRAL_BUFFER_SCORE: f64 = 70.0;

/// Weights for the four ranking terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    /// Weight for remaining capacity (default: 0.40)
    pub availability: f64,
    /// Weight for closeness to the requested time (default: 0.30)
    pub time_proximity: f64,
    /// Weight for reliability buffer (default: 0.20)
    pub carrier_buffer: f64,
    /// Weight for preferred gate (default: 0.10)
    pub gate_match: f64,
}

pub const DEFAULT_WEIGHTS: RankingWeights = RankingWeights {
    availability: 0.40,
    time_proximity: 0.30,
    carrier_buffer: 0.20,
    gate_match: 0.10,
};

impl Default for RankingWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// Input accepted by the offline `recommend` entry points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub requested_time: NaiveDateTime,
    #[serde(default)]
    pub candidates: Vec<SlotCandidate>,
    #[serde(default)]
    pub carrier_score: Option<f64>,
    #[serde(default)]
    pub preferred_gate: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SlotRanker {
    weights: RankingWeights,
}

impl SlotRanker {
    pub fn new() -> Self {
        Self { weights: RankingWeights::default() }
    }

    pub fn with_weights(weights: RankingWeights) -> Self {
        Self { weights }
    }

    pub fn recommend(
        &self,
        requested: NaiveDateTime,
        candidates: &[SlotCandidate],
        carrier_score: Option<f64>,
        preferred_gate: Option<&str>,
    ) -> RecommendationResult {
        if candidates.is_empty() {
            return RecommendationResult {
                ranked: Vec::new(),
                strategy: Strategy::NoCandidates,
                reasons: vec!["No available slots match your criteria".to_owned()],
            };
        }

        let low_score = carrier_score
            .filter(|score| score.is_finite())
            .is_some_and(|score| score < LOW_CARRIER_SCORE_THRESHOLD);
        let preferred_gate = preferred_gate.map(str::trim).filter(|gate| !gate.is_empty());

        let open: Vec<&SlotCandidate> = candidates.iter().filter(|slot| !slot.is_full()).collect();
        if open.is_empty() {
            let ranked = self.rank_all(candidates.iter(), requested, low_score, preferred_gate);
            return RecommendationResult {
                ranked,
                strategy: Strategy::NoCapacity,
                reasons: vec!["All slots are fully booked".to_owned()],
            };
        }

        let ranked = self.rank_all(open.into_iter(), requested, low_score, preferred_gate);
        let strategy = if low_score { Strategy::BufferRecommended } else { Strategy::Standard };
        let reasons = overall_reasons(strategy, carrier_score, &ranked);

        RecommendationResult { ranked, strategy, reasons }
    }

    fn rank_all<'a>(
        &self,
        candidates: impl Iterator<Item = &'a SlotCandidate>,
        requested: NaiveDateTime,
        low_score: bool,
        preferred_gate: Option<&str>,
    ) -> Vec<RankedSlot> {
        let mut ranked: Vec<RankedSlot> = candidates
            .map(|slot| self.rank_slot(slot, requested, low_score, preferred_gate))
            .collect();

        ranked.sort_by(|left, right| {
            right
                .rank_score
                .total_cmp(&left.rank_score)
                .then_with(|| {
                    distance_minutes(&left.slot, requested)
                        .total_cmp(&distance_minutes(&right.slot, requested))
                })
                .then_with(|| left.slot.start.cmp(&right.slot.start))
        });
        ranked
    }

    fn rank_slot(
        &self,
        slot: &SlotCandidate,
        requested: NaiveDateTime,
        low_score: bool,
        preferred_gate: Option<&str>,
    ) -> RankedSlot {
        let mut reasons = Vec::new();
        let remaining = slot.effective_remaining();
        let capacity = slot.capacity;
        let half_full = f64::from(remaining) > f64::from(capacity) * 0.5;

        let availability =
            if capacity == 0 { 0.0 } else { f64::from(remaining) / f64::from(capacity) * 100.0 };
        reasons.push(availability_reason(remaining, capacity));

        let offset = offset_minutes(slot, requested);
        let distance = offset.abs();
        let whole = distance.floor() as i64;
        let mut proximity = (100.0 - distance / MINUTES_PER_PROXIMITY_POINT).max(0.0);
        match offset.partial_cmp(&0.0) {
            Some(Ordering::Equal) | None => reasons.push("Exact time match".to_owned()),
            Some(Ordering::Less) if distance <= BUFFER_WINDOW_MINUTES => {
                reasons.push(format!("Earlier by {whole}min - good buffer"));
            }
            Some(Ordering::Less) => reasons.push(format!("Earlier by {whole}min")),
            Some(Ordering::Greater) if low_score => {
                proximity *= LATE_SLOT_FACTOR;
                if distance > BUFFER_WINDOW_MINUTES {
                    reasons.push(format!("Later than requested (+{whole}min) - consider earlier"));
                } else {
                    reasons.push(format!("Later by {whole}min"));
                }
            }
            Some(Ordering::Greater) if distance <= CLOSE_WINDOW_MINUTES => {
                reasons.push(format!("Close to requested time (+/-{whole}min)"));
            }
            Some(Ordering::Greater) => reasons.push(format!("Time difference: {whole}min")),
        }

        let buffer = if !low_score {
            NEUTRAL_BUFFER_SCORE
        } else if offset < 0.0 {
            reasons.push("Early slot recommended for reliability buffer".to_owned());
            100.0
        } else if half_full {
            80.0
        } else {
            50.0
        };

        let gate_match = match (preferred_gate, slot.gate.as_deref()) {
            (Some(wanted), Some(gate)) if wanted.eq_ignore_ascii_case(gate.trim()) => {
                reasons.push(format!("Matches requested gate {gate}"));
                100.0
            }
            _ => 0.0,
        };

        let total = availability * self.weights.availability
            + proximity * self.weights.time_proximity
            + buffer * self.weights.carrier_buffer
            + gate_match * self.weights.gate_match;

        RankedSlot {
            slot: slot.clone(),
            rank_score: round2(total.clamp(0.0, 100.0)),
            reasons,
        }
    }
}

/// Ranks with the default weights.
pub fn recommend(
    requested: NaiveDateTime,
    candidates: &[SlotCandidate],
    carrier_score: Option<f64>,
    preferred_gate: Option<&str>,
) -> RecommendationResult {
    SlotRanker::new().recommend(requested, candidates, carrier_score, preferred_gate)
}

/// Share of total capacity still open across all candidates. `None` when
/// there is no capacity to measure.
pub fn availability_ratio(candidates: &[SlotCandidate]) -> Option<f64> {
    let capacity: u64 = candidates.iter().map(|slot| u64::from(slot.capacity)).sum();
    if capacity == 0 {
        return None;
    }
    let remaining: u64 = candidates.iter().map(|slot| u64::from(slot.effective_remaining())).sum();
    Some(remaining as f64 / capacity as f64)
}

fn offset_minutes(slot: &SlotCandidate, requested: NaiveDateTime) -> f64 {
    (slot.start - requested).num_seconds() as f64 / 60.0
}

fn distance_minutes(slot: &SlotCandidate, requested: NaiveDateTime) -> f64 {
    offset_minutes(slot, requested).abs()
}

fn availability_reason(remaining: u32, capacity: u32) -> String {
    let remaining_f = f64::from(remaining);
    let capacity_f = f64::from(capacity);
    if remaining_f > capacity_f * 0.5 {
        format!("High availability ({remaining}/{capacity} spots)")
    } else if remaining_f > capacity_f * 0.2 {
        format!("Moderate availability ({remaining}/{capacity} spots)")
    } else {
        format!("Limited availability ({remaining}/{capacity} spots)")
    }
}

fn overall_reasons(
    strategy: Strategy,
    carrier_score: Option<f64>,
    ranked: &[RankedSlot],
) -> Vec<String> {
    let mut reasons = Vec::new();
    match (strategy, carrier_score) {
        (Strategy::BufferRecommended, Some(score)) => reasons.push(format!(
            "Carrier score is {score:.0}/100 - recommending earlier slots for reliability buffer"
        )),
        _ => reasons.push("Slots ranked by availability and time proximity".to_owned()),
    }

    if let Some(top) = ranked.first() {
        reasons.push(format!(
            "Top recommendation: {} at {}/{} ({}/{} available)",
            top.slot.start.format("%Y-%m-%d %H:%M"),
            top.slot.terminal,
            top.slot.gate.as_deref().unwrap_or("-"),
            top.slot.effective_remaining(),
            top.slot.capacity
        ));
    }

    let shown = ranked.len().min(RecommendationResult::RECOMMENDED_COUNT);
    if shown > 1 {
        reasons.push(format!("Showing top {shown} alternatives"));
    }
    reasons
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
