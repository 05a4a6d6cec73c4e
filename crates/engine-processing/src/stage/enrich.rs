use crate::{
    error::PipelineError,
    message::StageEvent,
    stage::{receiver_stream, report},
};
use connectors::adapter::Enricher;
use engine_config::settings::EnrichmentErrorMode;
use engine_core::metrics::Metrics;
use futures::StreamExt;
use model::{
    execution::loss::EnrichmentLoss,
    records::{enriched::EnrichedRecord, record::Record},
};
use std::{num::NonZeroUsize, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Runs one enrichment lookup per record. Lookups are independent, so a slow
/// record never holds back the others.
pub struct EnrichStage {
    enricher: Arc<dyn Enricher>,
    concurrency: NonZeroUsize,
    on_error: EnrichmentErrorMode,
    metrics: Metrics,
}

impl EnrichStage {
    pub fn new(
        enricher: Arc<dyn Enricher>,
        concurrency: NonZeroUsize,
        on_error: EnrichmentErrorMode,
        metrics: Metrics,
    ) -> Self {
        Self {
            enricher,
            concurrency,
            on_error,
            metrics,
        }
    }

    pub async fn run(
        self,
        records: mpsc::Receiver<Record>,
        enriched: mpsc::Sender<EnrichedRecord>,
        events: mpsc::Sender<StageEvent>,
    ) {
        info!(
            concurrency = self.concurrency.get(),
            on_error = ?self.on_error,
            "Enrichment stage started"
        );
        let this = &self;
        let enriched = &enriched;
        let events = &events;

        receiver_stream(records)
            .for_each_concurrent(self.concurrency.get(), |record| async move {
                this.enrich_record(record, enriched, events).await;
            })
            .await;

        info!("Enrichment stage drained");
    }

    async fn enrich_record(
        &self,
        record: Record,
        enriched: &mpsc::Sender<EnrichedRecord>,
        events: &mpsc::Sender<StageEvent>,
    ) {
        let record_id = record.id;

        match self.enricher.enrich(&record).await {
            Ok(enrichment) => {
                self.metrics.increment_enriched(1);
                debug!(record_id = %record_id, "Record enriched");
                report(events, StageEvent::RecordEnriched { record_id }).await;

                if enriched
                    .send(EnrichedRecord::new(record, enrichment))
                    .await
                    .is_err()
                {
                    let error = PipelineError::Channel("batch buffer input closed".to_string());
                    report(events, StageEvent::Failed(error)).await;
                }
            }
            Err(source) => match self.on_error {
                EnrichmentErrorMode::Drop => {
                    warn!(
                        record_id = %record_id,
                        error = %source,
                        "Enrichment failed, dropping record"
                    );
                    self.metrics.increment_lost(1);
                    let loss = EnrichmentLoss::new(record_id, source.to_string());
                    report(events, StageEvent::RecordLost(loss)).await;
                }
                EnrichmentErrorMode::Fail => {
                    error!(record_id = %record_id, error = %source, "Enrichment failed");
                    self.metrics.increment_failures(1);
                    let error = PipelineError::Enrichment { record_id, source };
                    report(events, StageEvent::Failed(error)).await;
                }
            },
        }
    }
}
