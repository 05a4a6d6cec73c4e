use crate::{
    error::PipelineError,
    message::{FetchRequest, StageEvent},
    stage::{report, unbounded_stream},
};
use connectors::adapter::RecordSource;
use engine_core::metrics::Metrics;
use futures::StreamExt;
use model::records::record::Record;
use std::{num::NonZeroUsize, sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Retrieves pages at controller-issued cursors and fans the records out to
/// the enrichment stage. Pages may complete in any order.
pub struct FetchStage {
    source: Arc<dyn RecordSource>,
    concurrency: NonZeroUsize,
    metrics: Metrics,
}

impl FetchStage {
    pub fn new(source: Arc<dyn RecordSource>, concurrency: NonZeroUsize, metrics: Metrics) -> Self {
        Self {
            source,
            concurrency,
            metrics,
        }
    }

    pub async fn run(
        self,
        requests: mpsc::UnboundedReceiver<FetchRequest>,
        records: mpsc::Sender<Record>,
        events: mpsc::Sender<StageEvent>,
    ) {
        info!(concurrency = self.concurrency.get(), "Fetch stage started");
        let this = &self;
        let records = &records;
        let events = &events;

        unbounded_stream(requests)
            .for_each_concurrent(self.concurrency.get(), |request| async move {
                this.fetch_page(request, records, events).await;
            })
            .await;

        info!("Fetch stage drained");
    }

    async fn fetch_page(
        &self,
        request: FetchRequest,
        records: &mpsc::Sender<Record>,
        events: &mpsc::Sender<StageEvent>,
    ) {
        let FetchRequest { cursor, limit } = request;
        let start = Instant::now();

        let page = match self.source.fetch(limit, cursor.offset()).await {
            Ok(page) => page,
            Err(source) => {
                error!(cursor = %cursor, error = %source, "Page fetch failed");
                self.metrics.increment_failures(1);
                let error = PipelineError::SourceFetch { cursor, source };
                report(events, StageEvent::FetchFailed { cursor, error }).await;
                return;
            }
        };

        if page.is_empty() {
            debug!(cursor = %cursor, "Empty page");
            report(events, StageEvent::SourceExhausted { cursor }).await;
            return;
        }

        let count = page.len();
        self.metrics.increment_pages(count as u64);
        debug!(
            cursor = %cursor,
            rows = count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched page"
        );
        report(events, StageEvent::PageFetched { cursor, count }).await;

        for record in page {
            if records.send(record).await.is_err() {
                let error = PipelineError::Channel("enrichment input closed".to_string());
                report(events, StageEvent::Failed(error)).await;
                return;
            }
        }
    }
}
