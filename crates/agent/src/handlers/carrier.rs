use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use portgate_core::domain::carrier::{CarrierId, ScoreResult};
use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::operations::statistics_from_bookings;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_core::scoring::{CarrierScorer, ALGORITHM_TAG};
use portgate_upstream::{BookingService, CarrierService};

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRequest};

/// Ceiling on scores derived from raw booking history.
pub const FALLBACK_MAX_SCORE: f64 = 75.0;
pub const FALLBACK_MAX_CONFIDENCE: f64 = 0.6;
const LOW_CONFIDENCE: f64 = 0.7;
const KEY_FACTOR_COUNT: usize = 3;

pub const PRIMARY_SOURCE: &str = "carrier_service";
pub const FALLBACK_SOURCE: &str = "booking_service_fallback";

pub struct CarrierScoreHandler {
    carriers: Arc<dyn CarrierService>,
    bookings: Arc<dyn BookingService>,
    scorer: CarrierScorer,
    window_days: u32,
}

/// A score plus where its statistics came from.
pub(crate) struct SourcedScore {
    pub result: ScoreResult,
    pub quality: DataQuality,
    pub source: &'static str,
}

impl CarrierScoreHandler {
    pub fn new(
        carriers: Arc<dyn CarrierService>,
        bookings: Arc<dyn BookingService>,
        window_days: u32,
    ) -> Self {
        Self { carriers, bookings, scorer: CarrierScorer::new(), window_days }
    }

    /// Scores from the carrier service, falling back to booking history when
    /// the primary cannot answer.
    pub(crate) async fn score_carrier(
        &self,
        carrier_id: &CarrierId,
        request: &HandlerRequest<'_>,
    ) -> Result<SourcedScore, HandlerError> {
        let caller = request.caller;
        match self.carriers.carrier_stats(carrier_id, self.window_days, caller).await {
            Ok(stats) => Ok(SourcedScore {
                result: self.scorer.score(&stats),
                quality: DataQuality::Primary,
                source: PRIMARY_SOURCE,
            }),
            Err(error) if error.allows_fallback() => {
                warn!(
                    event_name = "agent.carrier_score.fallback",
                    correlation_id = %caller.trace_id,
                    carrier_id = %carrier_id,
                    error = %error,
                    "carrier statistics unavailable, deriving from booking history"
                );
                let history = self
                    .bookings
                    .carrier_bookings(carrier_id, self.window_days, caller)
                    .await
                    .map_err(HandlerError::upstream("booking_service"))?;
                let stats = statistics_from_bookings(&history, self.window_days);
                Ok(SourcedScore {
                    result: self
                        .scorer
                        .score(&stats)
                        .capped(FALLBACK_MAX_SCORE, FALLBACK_MAX_CONFIDENCE),
                    quality: DataQuality::Fallback,
                    source: FALLBACK_SOURCE,
                })
            }
            Err(error) => Err(HandlerError::upstream(PRIMARY_SOURCE)(error)),
        }
    }
}

#[async_trait]
impl Handler for CarrierScoreHandler {
    fn name(&self) -> &'static str {
        "carrier_score"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let carrier_id = request.carrier().ok_or_else(|| HandlerError::missing(EntityKey::CarrierId))?;
        let SourcedScore { result, quality, source } =
            self.score_carrier(&carrier_id, request).await?;

        info!(
            event_name = "agent.carrier_score.scored",
            correlation_id = %request.caller.trace_id,
            carrier_id = %carrier_id,
            tier = %result.tier,
            fallback = quality == DataQuality::Fallback,
            "carrier scored"
        );

        let message = score_message(&carrier_id, &result, quality);
        let data = json!({
            "carrier_id": carrier_id,
            "score": result.score,
            "tier": result.tier,
            "confidence": result.confidence,
            "components": result.components,
            "reasons": result.reasons,
            "stats_summary": result.stats_summary,
            "window_days": self.window_days,
            "source": source,
        });
        let provenance = Provenance::new(request.caller.trace_id.clone(), quality)
            .with_algorithm(ALGORITHM_TAG)
            .with_source(source);

        Ok(AgentResult::new(message, data, provenance))
    }
}

fn score_message(carrier_id: &CarrierId, result: &ScoreResult, quality: DataQuality) -> String {
    let mut message = format!(
        "Carrier {carrier_id} has a reliability score of {:.1}/100 (Tier {}).",
        result.score, result.tier
    );

    if !result.reasons.is_empty() {
        message.push_str("\n\nKey Factors:");
        for reason in result.reasons.iter().take(KEY_FACTOR_COUNT) {
            let _ = write!(message, "\n• {reason}");
        }
    }
    if result.confidence < LOW_CONFIDENCE {
        let _ = write!(
            message,
            "\n\nNote: confidence is limited ({:.0}%) because of the small booking sample.",
            result.confidence * 100.0
        );
    }
    if quality == DataQuality::Fallback {
        message.push_str("\n\nDerived from booking history; detailed carrier statistics were unavailable.");
    }
    message
}
