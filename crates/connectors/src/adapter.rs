use crate::error::ConnectorError;
use async_trait::async_trait;
use model::records::{batch::Batch, record::Record};

/// Paginated source of primary records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches up to `limit` records starting at `offset`.
    ///
    /// A page shorter than `limit` is valid. An empty page is the only
    /// exhaustion signal.
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<Record>, ConnectorError>;
}

/// Per-record secondary lookup.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, record: &Record) -> Result<serde_json::Value, ConnectorError>;
}

/// Acknowledgement returned by a sink for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Number of records the sink accepted from the batch.
    pub accepted: usize,
}

impl Ack {
    pub fn all(batch: &Batch) -> Self {
        Ack {
            accepted: batch.len(),
        }
    }
}

/// Downstream consumer of flushed batches. Batches are never empty and never
/// larger than the configured `max_batch_size`.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, batch: &Batch) -> Result<Ack, ConnectorError>;
}
