use crate::records::{enriched::EnrichedRecord, record::RecordId};
use serde::Serialize;
use std::fmt;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Why the batch buffer closed a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// Accumulated count reached `max_batch_size`.
    Full,
    /// The rolling flush timer elapsed.
    Timeout,
    /// Nothing else could arrive before a flush, so the buffer was asked to let go.
    Settle,
    /// Final partial batch emitted while the pipeline drains.
    Drain,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlushTrigger::Full => "full",
            FlushTrigger::Timeout => "timeout",
            FlushTrigger::Settle => "settle",
            FlushTrigger::Drain => "drain",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub seq: u64,
    pub records: Vec<EnrichedRecord>, // never empty
    pub trigger: FlushTrigger,
    pub manifest: Manifest,
    pub ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub record_count: usize,
    pub checksum_xxh3: u64, // rolling checksum over record ids, in batch order
}

pub fn manifest_for(records: &[EnrichedRecord]) -> Manifest {
    let checksum = records.iter().fold(0u64, |h, r| {
        xxh3_64_with_seed(&r.id().0.to_le_bytes(), h)
    });

    Manifest {
        record_count: records.len(),
        checksum_xxh3: checksum,
    }
}

impl Batch {
    pub fn new(
        id: impl Into<String>,
        seq: u64,
        records: Vec<EnrichedRecord>,
        trigger: FlushTrigger,
    ) -> Self {
        let manifest = manifest_for(&records);
        Batch {
            id: id.into(),
            seq,
            records,
            trigger,
            manifest,
            ts: chrono::Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.iter().map(EnrichedRecord::id).collect()
    }
}
