use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use tracing::{debug, warn};

use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::carrier::CarrierId;
use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::intent::Intent;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_core::domain::slot::{RecommendationResult, SlotCandidate, Strategy};
use portgate_core::ranking::{availability_ratio, SlotRanker, ALGORITHM_TAG};
use portgate_core::scoring::CarrierScorer;
use portgate_upstream::{CarrierService, SlotService};

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRequest, HandlerSettings};

/// Serves both slot availability and slot recommendation.
pub struct SlotHandler {
    slots: Arc<dyn SlotService>,
    carriers: Arc<dyn CarrierService>,
    ranker: SlotRanker,
    scorer: CarrierScorer,
    settings: HandlerSettings,
}

impl SlotHandler {
    pub fn new(
        slots: Arc<dyn SlotService>,
        carriers: Arc<dyn CarrierService>,
        settings: HandlerSettings,
    ) -> Self {
        Self { slots, carriers, ranker: SlotRanker::new(), scorer: CarrierScorer::new(), settings }
    }

    /// Reliability score used to bias ranking. Any failure means standard
    /// ranking, never a failed request.
    async fn carrier_score(&self, carrier_id: Option<CarrierId>, caller: &CallerContext) -> Option<f64> {
        let carrier_id = carrier_id?;
        match self
            .carriers
            .carrier_stats(&carrier_id, self.settings.carrier_window_days, caller)
            .await
        {
            Ok(stats) => Some(self.scorer.score(&stats).score),
            Err(error) => {
                warn!(
                    event_name = "agent.slot.carrier_score_unavailable",
                    correlation_id = %caller.trace_id,
                    carrier_id = %carrier_id,
                    error = %error,
                    "ranking without carrier reliability"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Handler for SlotHandler {
    fn name(&self) -> &'static str {
        "slot"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let terminal = request
            .entities
            .text(EntityKey::Terminal)
            .ok_or_else(|| HandlerError::missing(EntityKey::Terminal))?
            .to_uppercase();
        let date = request.entities.date().unwrap_or_else(|| request.now.date());
        let requested =
            date.and_time(request.entities.time().unwrap_or(self.settings.default_slot_time));
        let gate = request.entities.text(EntityKey::Gate);
        let carrier_id = request.visible_carrier();

        // The gate is a ranking preference, so candidates are fetched for the whole terminal.
        let (candidates, carrier_score) = tokio::join!(
            self.slots.slot_candidates(&terminal, date, None, caller),
            self.carrier_score(carrier_id, caller),
        );
        let candidates = candidates.map_err(HandlerError::upstream("slot_service"))?;

        let ratio = availability_ratio(&candidates);
        let recommend = request.intent == Intent::SlotRecommendation
            || ratio.is_some_and(|ratio| ratio < self.settings.low_availability_ratio);
        debug!(
            event_name = "agent.slot.fetched",
            correlation_id = %caller.trace_id,
            candidates = candidates.len(),
            recommend,
            "slot candidates fetched"
        );

        let recommendation = recommend
            .then(|| self.ranker.recommend(requested, &candidates, carrier_score, gate));

        let message = match &recommendation {
            Some(result) if request.intent == Intent::SlotRecommendation => {
                recommendation_message(&terminal, date, result)
            }
            Some(result) => format!(
                "{}\n\nAvailability is low, so here are the best alternatives:{}",
                availability_message(&terminal, date, &candidates, ratio),
                ranked_lines(result)
            ),
            None => availability_message(&terminal, date, &candidates, ratio),
        };

        let mut provenance =
            Provenance::new(caller.trace_id.clone(), DataQuality::Primary).with_source("slot_service");
        if let Some(result) = &recommendation {
            provenance = provenance.with_algorithm(ALGORITHM_TAG);
            if carrier_score.is_some() && result.strategy != Strategy::NoCandidates {
                provenance = provenance.with_source("carrier_service");
            }
        }

        let data = json!({
            "terminal": terminal,
            "date": date,
            "requested_time": requested,
            "gate": gate,
            "availability_ratio": ratio,
            "carrier_score": carrier_score,
            "slots": candidates,
            "recommendation": recommendation.as_ref().map(recommendation_data),
        });

        Ok(AgentResult::new(message, data, provenance))
    }
}

fn recommendation_data(result: &RecommendationResult) -> Value {
    json!({
        "strategy": result.strategy,
        "ranked": result.ranked,
        "recommended": result.recommended(),
        "reasons": result.reasons,
    })
}

fn availability_message(
    terminal: &str,
    date: NaiveDate,
    candidates: &[SlotCandidate],
    ratio: Option<f64>,
) -> String {
    if candidates.is_empty() {
        return format!("No slots found for terminal {terminal} on {date}.");
    }
    let open = candidates.iter().filter(|slot| !slot.is_full()).count();
    let percent = ratio.unwrap_or(0.0) * 100.0;
    format!(
        "Terminal {terminal} on {date}: {open} of {} slots have capacity ({percent:.0}% overall availability).",
        candidates.len()
    )
}

fn recommendation_message(terminal: &str, date: NaiveDate, result: &RecommendationResult) -> String {
    match result.strategy {
        Strategy::NoCandidates => format!("No slots found for terminal {terminal} on {date}."),
        Strategy::NoCapacity => {
            format!("All slots at terminal {terminal} on {date} are fully booked.")
        }
        Strategy::Standard | Strategy::BufferRecommended => {
            let mut message = format!("Recommended slots for terminal {terminal} on {date}:");
            message.push_str(&ranked_lines(result));
            if let Some(reason) = result.reasons.first() {
                let _ = write!(message, "\n\n{reason}");
            }
            message
        }
    }
}

fn ranked_lines(result: &RecommendationResult) -> String {
    let mut lines = String::new();
    for (index, ranked) in result.recommended().iter().enumerate() {
        let _ = write!(
            lines,
            "\n{}. {}{} (score {:.1}, {}/{} spots left)",
            index + 1,
            clock(ranked.slot.start),
            ranked.slot.gate.as_deref().map(|gate| format!(" gate {gate}")).unwrap_or_default(),
            ranked.rank_score,
            ranked.slot.effective_remaining(),
            ranked.slot.capacity,
        );
    }
    lines
}

fn clock(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}
