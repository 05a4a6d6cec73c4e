use crate::{
    adapter::{Ack, Sink},
    error::ConnectorError,
    simulated::LatencyRange,
};
use async_trait::async_trait;
use model::records::batch::Batch;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Bulk e-mail API: one request per batch, one e-mail per record.
pub struct SimulatedEmailSink {
    latency: LatencyRange,
    requests: AtomicU64,
    emails: AtomicU64,
}

impl SimulatedEmailSink {
    pub fn new() -> Self {
        Self {
            latency: LatencyRange::new(40, 80),
            requests: AtomicU64::new(0),
            emails: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: LatencyRange) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn emails(&self) -> u64 {
        self.emails.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedEmailSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for SimulatedEmailSink {
    async fn deliver(&self, batch: &Batch) -> Result<Ack, ConnectorError> {
        tokio::time::sleep(self.latency.sample(batch.seq)).await;

        self.requests.fetch_add(1, Ordering::Relaxed);
        self.emails.fetch_add(batch.len() as u64, Ordering::Relaxed);
        debug!(batch_id = %batch.id, emails = batch.len(), "Bulk e-mail sent");

        Ok(Ack::all(batch))
    }
}
