use connectors::adapter::{Enricher, RecordSource, Sink};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::metrics::Metrics;
use engine_processing::{
    buffer::BatchBuffer,
    error::PipelineError,
    message::{BufferCommand, FetchRequest, StageEvent},
    stage::{DeliveryStage, EnrichStage, FetchStage},
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info};

/// External collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn RecordSource>,
    pub enricher: Arc<dyn Enricher>,
    pub sink: Arc<dyn Sink>,
}

/// Receiving ends of the coordinator's outbound channels.
pub struct ControlChannels {
    pub fetch_rx: mpsc::UnboundedReceiver<FetchRequest>,
    pub flush_rx: mpsc::UnboundedReceiver<BufferCommand>,
}

pub struct StageWorkers {
    fetch: JoinHandle<()>,
    enrich: JoinHandle<()>,
    buffer: JoinHandle<()>,
    delivery: JoinHandle<()>,
}

impl StageWorkers {
    /// Waits for every stage to finish. Only a panicked stage is an error
    /// here; stage failures travel through the coordinator mailbox.
    pub async fn join(self) -> Result<(), PipelineError> {
        tokio::try_join!(self.fetch, self.enrich, self.buffer, self.delivery).map_err(|err| {
            error!("Stage worker panicked: {}", err);
            PipelineError::Actor(format!("stage worker failed: {err}"))
        })?;
        Ok(())
    }
}

/// Wires the stages together with bounded channels and spawns one task per
/// stage. Every stage gets its own sender into the coordinator mailbox.
pub fn spawn(
    run_id: &str,
    settings: &ValidatedSettings,
    collaborators: Collaborators,
    control: ControlChannels,
    events: &mpsc::Sender<StageEvent>,
    metrics: &Metrics,
) -> StageWorkers {
    info!("Launching stage workers");
    let capacity = settings.channel_capacity();
    let (record_tx, record_rx) = mpsc::channel(capacity);
    let (enriched_tx, enriched_rx) = mpsc::channel(capacity);
    let (batch_tx, batch_rx) = mpsc::channel(capacity);

    let fetch = FetchStage::new(
        collaborators.source,
        settings.fetch_concurrency(),
        metrics.clone(),
    );
    let enrich = EnrichStage::new(
        collaborators.enricher,
        settings.enrich_concurrency(),
        settings.on_enrichment_error(),
        metrics.clone(),
    );
    let buffer = BatchBuffer::new(
        run_id,
        settings.max_batch_size(),
        settings.flush_timeout(),
        metrics.clone(),
    );
    let delivery = DeliveryStage::new(
        collaborators.sink,
        settings.delivery_concurrency(),
        metrics.clone(),
    );

    StageWorkers {
        fetch: tokio::spawn(fetch.run(control.fetch_rx, record_tx, events.clone())),
        enrich: tokio::spawn(enrich.run(record_rx, enriched_tx, events.clone())),
        buffer: tokio::spawn(buffer.run(
            enriched_rx,
            control.flush_rx,
            batch_tx,
            events.clone(),
        )),
        delivery: tokio::spawn(delivery.run(batch_rx, events.clone())),
    }
}
