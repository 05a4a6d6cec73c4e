use crate::records::record::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record dropped because its enrichment lookup failed and the pipeline
/// was configured to carry on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentLoss {
    pub record_id: RecordId,
    pub error: String,
    pub lost_at: DateTime<Utc>,
}

impl EnrichmentLoss {
    pub fn new(record_id: RecordId, error: impl Into<String>) -> Self {
        Self {
            record_id,
            error: error.into(),
            lost_at: Utc::now(),
        }
    }
}
