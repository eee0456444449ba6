use thiserror::Error;

use portgate_core::domain::entity::EntityKey;
use portgate_core::errors::{ApplicationError, DomainError};
use portgate_upstream::UpstreamError;

/// Failure to assemble the pipeline itself.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum HandlerError {
    #[error("missing required entity `{field}`")]
    Validation { field: EntityKey },
    #[error("{collaborator} failed: {error}")]
    Upstream {
        collaborator: &'static str,
        #[source]
        error: UpstreamError,
    },
    #[error("internal handler failure: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn missing(field: EntityKey) -> Self {
        Self::Validation { field }
    }

    /// Adapter for `map_err` on collaborator calls.
    pub fn upstream(collaborator: &'static str) -> impl Fn(UpstreamError) -> Self {
        move |error| Self::Upstream { collaborator, error }
    }
}

impl From<HandlerError> for ApplicationError {
    fn from(value: HandlerError) -> Self {
        match value {
            HandlerError::Validation { field } => {
                ApplicationError::Domain(DomainError::MissingEntity { field: field.as_str() })
            }
            HandlerError::Upstream { collaborator, error } => {
                ApplicationError::Upstream(format!("{collaborator}: {error}"))
            }
            HandlerError::Internal(detail) => ApplicationError::Internal(detail),
        }
    }
}
