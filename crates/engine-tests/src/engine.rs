#[cfg(test)]
mod tests {
    use crate::{
        scenario_settings,
        utils::{MemorySource, RecordingSink, ScriptedEnricher, SinkBehaviour},
    };
    use async_trait::async_trait;
    use connectors::{
        adapter::{Ack, Sink},
        error::ConnectorError,
    };
    use engine_config::settings::{AdvancePolicyKind, EnrichmentErrorMode};
    use engine_core::event_bus::bus::EventBus;
    use engine_runtime::execution::{PipelineExecutor, start};
    use model::{
        events::pipeline::{PhaseChanged, PipelineCompleted, PipelineFailed},
        execution::phase::PipelinePhase,
        records::batch::Batch,
    };
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    const RUN_ID: &str = "engine-failure-run";

    fn phases(rx: &mut tokio::sync::mpsc::Receiver<Arc<PhaseChanged>>) -> Vec<PipelinePhase> {
        let mut seen = Vec::new();
        while let Ok(change) = rx.try_recv() {
            seen.push(change.to);
        }
        seen
    }

    /// Fails the first batch after 5ms while later batches take 200ms.
    struct StaggeredSink {
        source: Arc<MemorySource>,
        in_flight: AtomicUsize,
        completed: AtomicUsize,
        offsets_at_failure: Mutex<Option<usize>>,
    }

    impl StaggeredSink {
        fn new(source: Arc<MemorySource>) -> Self {
            Self {
                source,
                in_flight: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                offsets_at_failure: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Sink for StaggeredSink {
        async fn deliver(&self, batch: &Batch) -> Result<Ack, ConnectorError> {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let result = if batch.seq == 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                *self.offsets_at_failure.lock().unwrap() = Some(self.source.offsets().len());
                Err(ConnectorError::Unavailable("bulk email api".to_string()))
            } else {
                tokio::time::sleep(Duration::from_millis(200)).await;
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(Ack::all(batch))
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn fetch_error_fails_the_run() {
        let bus = EventBus::new();
        let (_sub, mut failed) = bus.subscribe::<PipelineFailed>(8).await;
        let (_phase_sub, mut changes) = bus.subscribe::<PhaseChanged>(16).await;

        let err = PipelineExecutor::new(
            scenario_settings(AdvancePolicyKind::QueueBounded, 15),
            Arc::new(MemorySource::new(40).failing_at(10)),
            Arc::new(ScriptedEnricher::new()),
            Arc::new(RecordingSink::new()),
        )
        .with_event_bus(bus)
        .with_run_id(RUN_ID)
        .run()
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "source_fetch");
        assert!(err.to_string().contains("cursor 10"), "got: {err}");

        let event = failed.try_recv().unwrap();
        assert_eq!(event.run_id, RUN_ID);
        assert_eq!(event.error, err.to_string());
        assert_eq!(phases(&mut changes).last(), Some(&PipelinePhase::Failed));
    }

    #[traced_test]
    #[tokio::test]
    async fn no_page_is_requested_after_a_fetch_error() {
        let source = Arc::new(MemorySource::new(40).failing_at(5));

        let err = start(
            scenario_settings(AdvancePolicyKind::BatchGated, 15),
            source.clone(),
            Arc::new(ScriptedEnricher::new()),
            Arc::new(RecordingSink::new()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "source_fetch");
        assert_eq!(source.offsets(), vec![0, 5]);
    }

    #[traced_test]
    #[tokio::test]
    async fn sink_error_fails_the_run() {
        let sink = Arc::new(RecordingSink::with_behaviour(SinkBehaviour::FailSeq(1)));

        let err = start(
            scenario_settings(AdvancePolicyKind::BatchGated, 15),
            Arc::new(MemorySource::new(12)),
            Arc::new(ScriptedEnricher::new()),
            sink.clone(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "delivery");
        assert!(err.to_string().contains("bulk email api"));
        assert!(sink.batches().is_empty());
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn delivery_failure_waits_for_batches_in_flight() {
        let source = Arc::new(MemorySource::new(40));
        let sink = Arc::new(StaggeredSink::new(source.clone()));
        let settings =
            scenario_settings(AdvancePolicyKind::QueueBounded, 20).with_concurrency(1, 5, 4);

        let err = start(
            settings,
            source.clone(),
            Arc::new(ScriptedEnricher::new()),
            sink.clone(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "delivery");
        assert_eq!(sink.in_flight.load(Ordering::SeqCst), 0);
        assert!(sink.completed.load(Ordering::SeqCst) > 0);

        let at_failure = sink.offsets_at_failure.lock().unwrap().unwrap();
        assert_eq!(source.offsets().len(), at_failure, "no page after the failure");
    }

    #[traced_test]
    #[tokio::test]
    async fn short_acknowledgement_is_fatal() {
        let err = start(
            scenario_settings(AdvancePolicyKind::QueueBounded, 15),
            Arc::new(MemorySource::new(5)),
            Arc::new(ScriptedEnricher::new()),
            Arc::new(RecordingSink::with_behaviour(SinkBehaviour::ShortAck)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "partial_delivery");
        assert!(err.to_string().contains("accepted 4 of 5"));
    }

    #[traced_test]
    #[tokio::test]
    async fn enrichment_error_is_fatal_when_configured() {
        let settings = scenario_settings(AdvancePolicyKind::QueueBounded, 15)
            .with_enrichment_errors(EnrichmentErrorMode::Fail);

        let err = start(
            settings,
            Arc::new(MemorySource::new(10)),
            Arc::new(ScriptedEnricher::new().failing(7)),
            Arc::new(RecordingSink::new()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "enrichment");
        assert!(err.to_string().contains("record 7"));
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_an_endless_run() {
        let cancel = CancellationToken::new();
        let source = Arc::new(
            MemorySource::new(usize::MAX / 2).with_latency(Duration::from_millis(20)),
        );
        let sink = Arc::new(RecordingSink::new().with_latency(Duration::from_millis(10)));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = PipelineExecutor::new(
            scenario_settings(AdvancePolicyKind::QueueBounded, 15),
            source.clone(),
            Arc::new(ScriptedEnricher::new()),
            sink.clone(),
        )
        .with_cancellation(cancel)
        .run()
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "cancelled");
        assert!(!source.offsets().is_empty());
        assert!(!sink.batches().is_empty(), "work before the cancel was delivered");
    }

    #[traced_test]
    #[tokio::test]
    async fn completed_run_publishes_lifecycle() {
        let bus = EventBus::new();
        let (_sub, mut completed) = bus.subscribe::<PipelineCompleted>(8).await;
        let (_phase_sub, mut changes) = bus.subscribe::<PhaseChanged>(16).await;

        let summary = PipelineExecutor::new(
            scenario_settings(AdvancePolicyKind::BatchGated, 15),
            Arc::new(MemorySource::new(7)),
            Arc::new(ScriptedEnricher::new()),
            Arc::new(RecordingSink::new()),
        )
        .with_event_bus(bus)
        .with_run_id(RUN_ID)
        .run()
        .await
        .unwrap();

        assert_eq!(summary.run_id, RUN_ID);
        assert_eq!(completed.try_recv().unwrap().records_delivered, 7);
        assert_eq!(
            phases(&mut changes),
            vec![
                PipelinePhase::Running,
                PipelinePhase::Draining,
                PipelinePhase::Complete
            ]
        );
    }
}
