use connectors::error::ConnectorError;
use engine_config::settings::error::SettingsError;
use model::{pagination::cursor::Cursor, records::record::RecordId};
use thiserror::Error;

/// Terminal error of a pipeline run. The first fatal error wins; later ones
/// are logged and discarded.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration rejected: {0}")]
    Config(#[from] SettingsError),

    #[error("Fetch failed at cursor {cursor}: {source}")]
    SourceFetch {
        cursor: Cursor,
        #[source]
        source: ConnectorError,
    },

    #[error("Enrichment failed for record {record_id}: {source}")]
    Enrichment {
        record_id: RecordId,
        #[source]
        source: ConnectorError,
    },

    #[error("Delivery of batch '{batch_id}' ({records} records) failed: {source}")]
    Delivery {
        batch_id: String,
        records: usize,
        #[source]
        source: ConnectorError,
    },

    #[error("Sink accepted {accepted} of {expected} records in batch '{batch_id}'")]
    PartialDelivery {
        batch_id: String,
        expected: usize,
        accepted: usize,
    },

    #[error("Pipeline invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("Stage channel closed unexpectedly: {0}")]
    Channel(String),

    #[error("Actor error: {0}")]
    Actor(String),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::SourceFetch { .. } => "source_fetch",
            PipelineError::Enrichment { .. } => "enrichment",
            PipelineError::Delivery { .. } => "delivery",
            PipelineError::PartialDelivery { .. } => "partial_delivery",
            PipelineError::InvariantViolation(_) => "invariant_violation",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Channel(_) => "channel",
            PipelineError::Actor(_) => "actor",
        }
    }
}
