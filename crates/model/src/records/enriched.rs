use crate::records::record::{Record, RecordId};
use serde::{Deserialize, Serialize};

/// A record together with the result of its per-record lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: Record,
    pub enrichment: serde_json::Value,
}

impl EnrichedRecord {
    pub fn new(record: Record, enrichment: serde_json::Value) -> Self {
        EnrichedRecord { record, enrichment }
    }

    /// Inherited unchanged from the source record.
    pub fn id(&self) -> RecordId {
        self.record.id
    }
}
