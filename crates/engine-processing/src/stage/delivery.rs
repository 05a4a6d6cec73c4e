use crate::{
    error::PipelineError,
    message::StageEvent,
    stage::{receiver_stream, report},
};
use connectors::adapter::Sink;
use engine_core::metrics::Metrics;
use futures::StreamExt;
use model::records::batch::Batch;
use std::{num::NonZeroUsize, sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub records_delivered: usize,
}

/// Hands flushed batches to the sink. Batches are delivered independently
/// and may be acknowledged out of flush order.
pub struct DeliveryStage {
    sink: Arc<dyn Sink>,
    concurrency: NonZeroUsize,
    metrics: Metrics,
}

impl DeliveryStage {
    pub fn new(sink: Arc<dyn Sink>, concurrency: NonZeroUsize, metrics: Metrics) -> Self {
        Self {
            sink,
            concurrency,
            metrics,
        }
    }

    pub async fn run(self, batches: mpsc::Receiver<Batch>, events: mpsc::Sender<StageEvent>) {
        info!(concurrency = self.concurrency.get(), "Delivery stage started");
        let this = &self;
        let events = &events;

        receiver_stream(batches)
            .for_each_concurrent(self.concurrency.get(), |batch| async move {
                let event = match this.deliver(&batch).await {
                    Ok(result) => StageEvent::BatchDelivered {
                        batch_id: batch.id.clone(),
                        size: result.records_delivered,
                    },
                    Err(err) => {
                        this.metrics.increment_failures(1);
                        error!(batch_id = %batch.id, error = %err, "Batch delivery failed");
                        StageEvent::Failed(err)
                    }
                };
                report(events, event).await;
            })
            .await;

        info!("Delivery stage drained");
    }

    /// Delivers one batch. An acknowledgement covering fewer records than
    /// the batch holds is an error: those records would otherwise vanish.
    pub async fn deliver(&self, batch: &Batch) -> Result<DeliveryResult, PipelineError> {
        let start = Instant::now();
        let ack = self
            .sink
            .deliver(batch)
            .await
            .map_err(|source| PipelineError::Delivery {
                batch_id: batch.id.clone(),
                records: batch.len(),
                source,
            })?;

        if ack.accepted != batch.len() {
            return Err(PipelineError::PartialDelivery {
                batch_id: batch.id.clone(),
                expected: batch.len(),
                accepted: ack.accepted,
            });
        }

        let duration = start.elapsed();
        let rows_per_sec = if duration.as_secs_f64() > 0.0 {
            batch.len() as f64 / duration.as_secs_f64()
        } else {
            0.0
        };
        self.metrics.increment_delivered(batch.len() as u64);
        info!(
            batch_id = %batch.id,
            seq = batch.seq,
            rows = batch.len(),
            trigger = %batch.trigger,
            duration_ms = duration.as_millis() as u64,
            rows_per_sec = rows_per_sec as u64,
            "Batch delivered"
        );

        Ok(DeliveryResult {
            records_delivered: batch.len(),
        })
    }
}
