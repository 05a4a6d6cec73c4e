#![allow(dead_code)]

use async_trait::async_trait;
use connectors::{
    adapter::{Ack, Enricher, RecordSource, Sink},
    error::ConnectorError,
};
use engine_config::report::summary::PipelineSummary;
use model::{
    pagination::cursor::Cursor,
    records::{batch::Batch, record::Record},
};
use serde_json::{Value, json};
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

/// In-memory paginated source over `0..total`.
pub struct MemorySource {
    total: usize,
    latency: Duration,
    fail_at: Option<usize>,
    offsets: Mutex<Vec<usize>>,
}

impl MemorySource {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            latency: Duration::ZERO,
            fail_at: None,
            offsets: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every fetch at `offset` fails.
    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at = Some(offset);
        self
    }

    /// Offsets requested so far, in call order.
    pub fn offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<Record>, ConnectorError> {
        self.offsets.lock().unwrap().push(offset);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_at == Some(offset) {
            return Err(ConnectorError::Unavailable(format!("companies at {offset}")));
        }

        let end = (offset + limit).min(self.total);
        Ok((offset..end.max(offset))
            .map(|i| Record::new(i as u64, json!({ "company": format!("company-{i}") })))
            .collect())
    }
}

/// Enricher with per-record latency and scripted failures.
#[derive(Default)]
pub struct ScriptedEnricher {
    latency: HashMap<u64, Duration>,
    default_latency: Duration,
    failing: HashSet<u64>,
}

impl ScriptedEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    pub fn with_latency(mut self, id: u64, latency: Duration) -> Self {
        self.latency.insert(id, latency);
        self
    }

    pub fn failing(mut self, id: u64) -> Self {
        self.failing.insert(id);
        self
    }
}

#[async_trait]
impl Enricher for ScriptedEnricher {
    async fn enrich(&self, record: &Record) -> Result<Value, ConnectorError> {
        let id = record.id.0;
        let latency = self
            .latency
            .get(&id)
            .copied()
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(&id) {
            return Err(ConnectorError::Rejected(format!("no orders for {id}")));
        }
        Ok(json!({ "orders": [id * 10, id * 10 + 1] }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkBehaviour {
    AcceptAll,
    /// Acknowledges one record fewer than the batch holds.
    ShortAck,
    /// Fails the batch with this sequence number.
    FailSeq(u64),
}

/// Sink that keeps every batch it accepted.
pub struct RecordingSink {
    behaviour: SinkBehaviour,
    latency: Duration,
    batches: Mutex<Vec<Batch>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::with_behaviour(SinkBehaviour::AcceptAll)
    }

    pub fn with_behaviour(behaviour: SinkBehaviour) -> Self {
        Self {
            behaviour,
            latency: Duration::ZERO,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accepted batches in flush order.
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches = self.batches.lock().unwrap().clone();
        batches.sort_by_key(|b| b.seq);
        batches
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches().iter().map(Batch::len).collect()
    }

    pub fn delivered_ids(&self) -> Vec<u64> {
        self.batches()
            .iter()
            .flat_map(|b| b.record_ids())
            .map(|id| id.0)
            .collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, batch: &Batch) -> Result<Ack, ConnectorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.behaviour {
            SinkBehaviour::FailSeq(seq) if batch.seq == seq => {
                Err(ConnectorError::Unavailable("bulk email api".to_string()))
            }
            SinkBehaviour::ShortAck => Ok(Ack {
                accepted: batch.len().saturating_sub(1),
            }),
            _ => {
                self.batches.lock().unwrap().push(batch.clone());
                Ok(Ack::all(batch))
            }
        }
    }
}

/// Cursors start at 0 and step by `batch_size` with no gaps.
pub fn assert_contiguous_cursors(cursors: &[Cursor], batch_size: usize) {
    assert!(!cursors.is_empty(), "no cursor was issued");
    for (i, cursor) in cursors.iter().enumerate() {
        assert_eq!(cursor.offset(), i * batch_size, "cursor {i} out of sequence");
    }
}

/// Every record of `0..total` was delivered exactly once, apart from `lost`.
pub fn assert_delivered_exactly_once(sink: &RecordingSink, total: u64, lost: &[u64]) {
    let mut ids = sink.delivered_ids();
    let delivered = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), delivered, "a record was delivered twice");

    let expected: Vec<u64> = (0..total).filter(|id| !lost.contains(id)).collect();
    assert_eq!(ids, expected);
}

pub fn assert_batches_bounded(sink: &RecordingSink, max_batch_size: usize) {
    for batch in sink.batches() {
        assert!(!batch.is_empty(), "batch {} is empty", batch.id);
        assert!(batch.len() <= max_batch_size, "batch {} too large", batch.id);
        assert_eq!(batch.manifest.record_count, batch.len());
    }
}

pub fn assert_summary_matches(summary: &PipelineSummary, sink: &RecordingSink) {
    assert_eq!(summary.records_delivered as usize, sink.delivered_ids().len());
    assert_eq!(summary.batches_sent as usize, sink.batches().len());
    assert_eq!(
        summary.records_fetched,
        summary.records_delivered + summary.records_lost
    );
}
