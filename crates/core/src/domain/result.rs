use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Primary,
    Fallback,
    Unavailable,
    Error,
    NotApplicable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    pub data_quality: DataQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub decision_path: Vec<String>,
}

impl Provenance {
    pub fn new(trace_id: impl Into<String>, data_quality: DataQuality) -> Self {
        Self {
            trace_id: trace_id.into(),
            timestamp: Utc::now(),
            data_quality,
            algorithm: None,
            sources: Vec::new(),
            decision_path: Vec::new(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }
}

/// Uniform output of every handler and of the pipeline itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub message: String,
    pub data: Value,
    pub provenance: Provenance,
    /// Typed cause behind an error-shaped result. Transports map it to a
    /// status; it never reaches the body.
    #[serde(skip)]
    pub failure: Option<ApplicationError>,
}

impl AgentResult {
    pub fn new(message: impl Into<String>, data: Value, provenance: Provenance) -> Self {
        Self { message: message.into(), data, provenance, failure: None }
    }

    pub fn with_failure(mut self, failure: ApplicationError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn data_quality(&self) -> DataQuality {
        self.provenance.data_quality
    }
}
