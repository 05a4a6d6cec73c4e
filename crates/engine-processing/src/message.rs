use crate::error::PipelineError;
use model::{
    execution::loss::EnrichmentLoss,
    pagination::cursor::Cursor,
    records::{batch::FlushTrigger, record::RecordId},
};

/// A page request issued by the offset controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub cursor: Cursor,
    pub limit: usize,
}

/// Commands the coordinator sends to the batch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferCommand {
    /// Flush everything once `through` records in total have reached the
    /// buffer. Records already reported as enriched may still be in transit.
    Flush { through: u64 },
}

/// Progress reported by the stages to the coordinator mailbox.
///
/// Each stage reports before handing work downstream, so the coordinator
/// always sees a record fetched before enriched, enriched before flushed and
/// flushed before delivered.
#[derive(Debug)]
pub enum StageEvent {
    PageFetched {
        cursor: Cursor,
        count: usize,
    },
    SourceExhausted {
        cursor: Cursor,
    },
    FetchFailed {
        cursor: Cursor,
        error: PipelineError,
    },
    RecordEnriched {
        record_id: RecordId,
    },
    RecordLost(EnrichmentLoss),
    BatchFlushed {
        batch_id: String,
        size: usize,
        trigger: FlushTrigger,
    },
    BatchDelivered {
        batch_id: String,
        size: usize,
    },
    /// Fatal failure from any stage other than fetch.
    Failed(PipelineError),
    Cancelled,
}

impl StageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StageEvent::PageFetched { .. } => "page_fetched",
            StageEvent::SourceExhausted { .. } => "source_exhausted",
            StageEvent::FetchFailed { .. } => "fetch_failed",
            StageEvent::RecordEnriched { .. } => "record_enriched",
            StageEvent::RecordLost(_) => "record_lost",
            StageEvent::BatchFlushed { .. } => "batch_flushed",
            StageEvent::BatchDelivered { .. } => "batch_delivered",
            StageEvent::Failed(_) => "failed",
            StageEvent::Cancelled => "cancelled",
        }
    }
}
