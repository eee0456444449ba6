use std::path::Path;

use portgate_core::{CarrierScorer, CarrierStatistics};

use super::{read_json, CommandResult, EXIT_INPUT};

const COMMAND: &str = "score";

pub fn run(stats_path: &Path) -> CommandResult {
    let stats: CarrierStatistics = match read_json(stats_path) {
        Ok(stats) => stats,
        Err(error) => return CommandResult::failure(COMMAND, "input", format!("{error:#}"), EXIT_INPUT),
    };

    let result = CarrierScorer::new().score(&stats);
    let summary = format!("score {:.2} (tier {}, confidence {:.2})", result.score, result.tier, result.confidence);
    CommandResult::success_data(COMMAND, summary, &result)
}
