use crate::{
    events::Event,
    execution::phase::PipelinePhase,
    pagination::cursor::Cursor,
    records::{batch::FlushTrigger, record::RecordId},
};
use chrono::{DateTime, Utc};

/// Emitted once the settings are validated and the first page is requested.
#[derive(Debug, Clone)]
pub struct PipelineStarted {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Event for PipelineStarted {
    fn event_type(&self) -> &'static str {
        "pipeline.started"
    }
}

/// Emitted every time the offset controller issues a fetch request.
#[derive(Debug, Clone)]
pub struct PageRequested {
    pub run_id: String,
    pub cursor: Cursor,
    pub queue_depth: usize,
    pub timestamp: DateTime<Utc>,
}

impl Event for PageRequested {
    fn event_type(&self) -> &'static str {
        "page.requested"
    }
}

/// Emitted when a non-empty page comes back from the source.
#[derive(Debug, Clone)]
pub struct PageFetched {
    pub run_id: String,
    pub cursor: Cursor,
    pub record_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl Event for PageFetched {
    fn event_type(&self) -> &'static str {
        "page.fetched"
    }
}

/// Emitted when the source returns an empty page.
#[derive(Debug, Clone)]
pub struct SourceExhausted {
    pub run_id: String,
    pub cursor: Cursor,
    pub timestamp: DateTime<Utc>,
}

impl Event for SourceExhausted {
    fn event_type(&self) -> &'static str {
        "source.exhausted"
    }
}

/// Emitted when the batch buffer hands a batch to the delivery stage.
#[derive(Debug, Clone)]
pub struct BatchFlushed {
    pub run_id: String,
    pub batch_id: String,
    pub record_count: usize,
    pub trigger: FlushTrigger,
    pub timestamp: DateTime<Utc>,
}

impl Event for BatchFlushed {
    fn event_type(&self) -> &'static str {
        "batch.flushed"
    }
}

/// Emitted when the sink acknowledges a batch.
#[derive(Debug, Clone)]
pub struct BatchDelivered {
    pub run_id: String,
    pub batch_id: String,
    pub record_count: usize,
    pub queue_depth: usize,
    pub timestamp: DateTime<Utc>,
}

impl Event for BatchDelivered {
    fn event_type(&self) -> &'static str {
        "batch.delivered"
    }
}

/// Emitted for a recoverable enrichment failure.
#[derive(Debug, Clone)]
pub struct RecordLost {
    pub run_id: String,
    pub record_id: RecordId,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl Event for RecordLost {
    fn event_type(&self) -> &'static str {
        "record.lost"
    }
}

#[derive(Debug, Clone)]
pub struct PhaseChanged {
    pub run_id: String,
    pub from: PipelinePhase,
    pub to: PipelinePhase,
    pub timestamp: DateTime<Utc>,
}

impl Event for PhaseChanged {
    fn event_type(&self) -> &'static str {
        "pipeline.phase_changed"
    }
}

#[derive(Debug, Clone)]
pub struct PipelineCompleted {
    pub run_id: String,
    pub records_delivered: u64,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl Event for PipelineCompleted {
    fn event_type(&self) -> &'static str {
        "pipeline.completed"
    }
}

#[derive(Debug, Clone)]
pub struct PipelineFailed {
    pub run_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl Event for PipelineFailed {
    fn event_type(&self) -> &'static str {
        "pipeline.failed"
    }
}
