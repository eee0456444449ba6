use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    pub start: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    pub terminal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    pub remaining: u32,
    pub capacity: u32,
}

impl SlotCandidate {
    pub fn new(
        start: NaiveDateTime,
        terminal: impl Into<String>,
        gate: Option<String>,
        remaining: u32,
        capacity: u32,
    ) -> Result<Self, DomainError> {
        let candidate = Self {
            slot_id: None,
            start,
            end: None,
            terminal: terminal.into(),
            gate,
            remaining,
            capacity,
        };
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn with_id(mut self, slot_id: impl Into<String>) -> Self {
        self.slot_id = Some(slot_id.into());
        self
    }

    pub fn with_end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.remaining > self.capacity {
            return Err(DomainError::InvariantViolation(format!(
                "slot remaining capacity {} exceeds total capacity {}",
                self.remaining, self.capacity
            )));
        }
        Ok(())
    }

    /// Remaining capacity bounded by total capacity, for candidates that were
    /// deserialized without validation.
    pub fn effective_remaining(&self) -> u32 {
        self.remaining.min(self.capacity)
    }

    pub fn is_full(&self) -> bool {
        self.effective_remaining() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedSlot {
    #[serde(flatten)]
    pub slot: SlotCandidate,
    pub rank_score: f64,
    pub reasons: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Standard,
    BufferRecommended,
    NoCandidates,
    NoCapacity,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::BufferRecommended => "buffer_recommended",
            Self::NoCandidates => "no_candidates",
            Self::NoCapacity => "no_capacity",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub ranked: Vec<RankedSlot>,
    pub strategy: Strategy,
    pub reasons: Vec<String>,
}

impl RecommendationResult {
    pub const RECOMMENDED_COUNT: usize = 5;

    /// Leading entries of the ranked list. Empty when nothing has capacity.
    pub fn recommended(&self) -> &[RankedSlot] {
        if self.strategy == Strategy::NoCapacity {
            return &[];
        }
        let end = self.ranked.len().min(Self::RECOMMENDED_COUNT);
        &self.ranked[..end]
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{RecommendationResult, SlotCandidate, Strategy};
    use crate::errors::DomainError;

    fn nine_am() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .and_then(|date| date.and_hms_opt(9, 0, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn constructor_rejects_remaining_above_capacity() {
        let error = SlotCandidate::new(nine_am(), "A", None, 11, 10).expect_err("must reject");

        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn effective_remaining_is_bounded_for_unvalidated_input() {
        let candidate: SlotCandidate = serde_json::from_str(
            r#"{"start":"2026-03-02T09:00:00","terminal":"A","remaining":12,"capacity":10}"#,
        )
        .expect("candidate should parse");

        assert_eq!(candidate.effective_remaining(), 10);
        assert!(!candidate.is_full());
    }

    #[test]
    fn strategy_serializes_snake_case() {
        let encoded = serde_json::to_string(&Strategy::BufferRecommended).expect("serialize");
        assert_eq!(encoded, "\"buffer_recommended\"");
        assert_eq!(Strategy::NoCapacity.as_str(), "no_capacity");
    }

    #[test]
    fn no_capacity_result_recommends_nothing() {
        let result = RecommendationResult {
            ranked: vec![],
            strategy: Strategy::NoCapacity,
            reasons: vec![],
        };
        assert!(result.recommended().is_empty());
    }
}
