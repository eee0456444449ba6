use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("endpoint not available (status {status})")]
    EndpointMissing { status: u16 },
    #[error("request rejected by collaborator (status {status})")]
    Rejected { status: u16 },
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator call timed out")]
    Timeout,
    #[error("could not decode collaborator response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Maps a non-success HTTP status onto the taxonomy. 404 stays a lookup
    /// miss; 405 and 501 mean the route itself is absent.
    pub fn from_status(status: u16, resource: &str) -> Self {
        match status {
            404 => Self::not_found(resource),
            405 | 501 => Self::EndpointMissing { status },
            400..=499 => Self::Rejected { status },
            _ => Self::Unavailable(format!("status {status}")),
        }
    }

    /// Failures that mean the primary collaborator cannot answer this kind of
    /// question at all (404, 405, 501).
    pub fn is_endpoint_missing(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::EndpointMissing { .. })
    }

    pub fn allows_fallback(&self) -> bool {
        self.is_endpoint_missing() || matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}
