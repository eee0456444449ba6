use chrono::{NaiveDate, Offset, Utc};
use portgate_agent::{Classification, EntityResolver, IntentClassifier};
use portgate_core::config::{AppConfig, LoadOptions};
use portgate_core::EntityMap;
use serde::Serialize;

use super::{CommandResult, EXIT_PIPELINE};

const COMMAND: &str = "classify";

#[derive(Debug, Serialize)]
struct ClassifyOutput {
    #[serde(flatten)]
    classification: Classification,
    entities: EntityMap,
}

/// Anchors on the configured port date. A config that does not load leaves
/// the UTC date, since classification itself needs no settings.
pub fn run(message: &str) -> CommandResult {
    let offset = AppConfig::load(LoadOptions::default())
        .ok()
        .and_then(|config| config.agents.utc_offset())
        .unwrap_or_else(|| Utc.fix());
    run_at(message, Utc::now().with_timezone(&offset).date_naive())
}

/// Classifies with relative dates anchored on `today`.
pub fn run_at(message: &str, today: NaiveDate) -> CommandResult {
    let classifier = match IntentClassifier::new() {
        Ok(classifier) => classifier,
        Err(error) => return CommandResult::failure(COMMAND, "pipeline_init", error.to_string(), EXIT_PIPELINE),
    };
    let resolver = match EntityResolver::new() {
        Ok(resolver) => resolver,
        Err(error) => return CommandResult::failure(COMMAND, "pipeline_init", error.to_string(), EXIT_PIPELINE),
    };

    let classification = classifier.classify(message);
    let entities = resolver.resolve(message, &classification, today);
    let summary = format!(
        "classified as {} ({} entities resolved)",
        classification.intent.as_str(),
        entities.len()
    );

    CommandResult::success_data(COMMAND, summary, &ClassifyOutput { classification, entities })
}
