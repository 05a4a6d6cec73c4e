use crate::execution::{PipelineExecutor, executor::watch_cancellation, start};
use async_trait::async_trait;
use connectors::{
    adapter::{Ack, Enricher, RecordSource, Sink},
    error::ConnectorError,
};
use engine_config::settings::PipelineSettings;
use engine_core::event_bus::bus::EventBus;
use engine_processing::message::StageEvent;
use model::{
    events::pipeline::PageRequested,
    records::{batch::Batch, record::Record},
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Never runs dry; each page takes 50ms.
struct EndlessSource;

#[async_trait]
impl RecordSource for EndlessSource {
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<Record>, ConnectorError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok((offset..offset + limit)
            .map(|i| Record::new(i as u64, json!({ "company": i })))
            .collect())
    }
}

struct FixedSource(usize);

#[async_trait]
impl RecordSource for FixedSource {
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<Record>, ConnectorError> {
        let end = (offset + limit).min(self.0);
        Ok((offset..end.max(offset))
            .map(|i| Record::new(i as u64, json!({ "company": i })))
            .collect())
    }
}

struct Echo;

#[async_trait]
impl Enricher for Echo {
    async fn enrich(&self, record: &Record) -> Result<Value, ConnectorError> {
        Ok(json!({ "orders": [record.id.0] }))
    }
}

struct AcceptAll;

#[async_trait]
impl Sink for AcceptAll {
    async fn deliver(&self, batch: &Batch) -> Result<Ack, ConnectorError> {
        Ok(Ack::all(batch))
    }
}

#[tokio::test]
async fn invalid_settings_never_start() {
    let settings = PipelineSettings::default()
        .with_batch_size(5)
        .with_max_queue_size(3);

    let err = start(
        settings,
        Arc::new(FixedSource(10)),
        Arc::new(Echo),
        Arc::new(AcceptAll),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn runs_a_small_source_end_to_end() {
    let bus = EventBus::new();
    let (_sub, mut requested) = bus.subscribe::<PageRequested>(64).await;

    let summary = PipelineExecutor::new(
        PipelineSettings::default().with_flush_timeout_ms(0),
        Arc::new(FixedSource(13)),
        Arc::new(Echo),
        Arc::new(AcceptAll),
    )
    .with_event_bus(bus)
    .with_run_id("run-small")
    .run()
    .await
    .unwrap();

    assert_eq!(summary.run_id, "run-small");
    assert_eq!(summary.records_fetched, 13);
    assert_eq!(summary.records_delivered, 13);
    assert_eq!(summary.metrics.records_delivered, 13);
    assert!(summary.is_lossless());

    let mut events = 0;
    while requested.try_recv().is_ok() {
        events += 1;
    }
    assert_eq!(events, summary.cursor_sequence.len());
}

#[tokio::test(start_paused = true)]
async fn cancellation_drains_and_fails() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });

    let err = PipelineExecutor::new(
        PipelineSettings::default(),
        Arc::new(EndlessSource),
        Arc::new(Echo),
        Arc::new(AcceptAll),
    )
    .with_cancellation(cancel)
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "cancelled");
}

#[tokio::test]
async fn cancel_watch_forwards_to_an_open_mailbox() {
    let (tx, mut rx) = mpsc::channel::<StageEvent>(1);
    let cancel = CancellationToken::new();

    let watch = watch_cancellation(cancel.clone(), tx.downgrade());
    cancel.cancel();
    watch.await.unwrap();

    assert!(matches!(rx.recv().await, Some(StageEvent::Cancelled)));
}

#[tokio::test]
async fn cancel_watch_skips_a_stopped_coordinator() {
    let (tx, rx) = mpsc::channel::<StageEvent>(1);
    drop(rx);
    let cancel = CancellationToken::new();

    let watch = watch_cancellation(cancel.clone(), tx.downgrade());
    cancel.cancel();

    watch.await.expect("watcher finishes without panicking");
    assert!(tx.is_closed());
}
