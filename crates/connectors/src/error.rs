use std::time::Duration;
use thiserror::Error;

/// Failure reported by an external collaborator (source, enricher or sink).
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The collaborator could not be reached.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered but refused the request.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connector error: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
