use std::path::Path;

use portgate_core::ranking::RecommendationRequest;
use portgate_core::SlotRanker;

use super::{read_json, CommandResult, EXIT_INPUT};

const COMMAND: &str = "recommend";

pub fn run(request_path: &Path) -> CommandResult {
    let request: RecommendationRequest = match read_json(request_path) {
        Ok(request) => request,
        Err(error) => return CommandResult::failure(COMMAND, "input", format!("{error:#}"), EXIT_INPUT),
    };

    if let Some(invalid) = request.candidates.iter().find_map(|slot| slot.validate().err()) {
        return CommandResult::failure(COMMAND, "invalid_candidate", invalid.to_string(), EXIT_INPUT);
    }

    let result = SlotRanker::new().recommend(
        request.requested_time,
        &request.candidates,
        request.carrier_score,
        request.preferred_gate.as_deref(),
    );
    let summary = format!(
        "strategy {}: {} ranked, {} recommended",
        result.strategy.as_str(),
        result.ranked.len(),
        result.recommended().len()
    );
    CommandResult::success_data(COMMAND, summary, &result)
}
