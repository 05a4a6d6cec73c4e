use crate::{
    actor::{coordinator::PipelineCoordinator, spawn::spawn_actor},
    execution::workers::{self, Collaborators, ControlChannels},
};
use connectors::adapter::{Enricher, RecordSource, Sink};
use engine_config::{
    report::summary::PipelineSummary,
    settings::{PipelineSettings, validator::SettingsValidator},
};
use engine_core::{event_bus::bus::EventBus, metrics::Metrics};
use engine_processing::{error::PipelineError, message::StageEvent, state::PipelineState};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Validates `settings` and runs the pipeline to completion.
///
/// Resolves with the run summary once every fetched record has been
/// delivered or reported lost, or with the first fatal error.
pub async fn start(
    settings: PipelineSettings,
    source: Arc<dyn RecordSource>,
    enricher: Arc<dyn Enricher>,
    sink: Arc<dyn Sink>,
) -> Result<PipelineSummary, PipelineError> {
    PipelineExecutor::new(settings, source, enricher, sink)
        .run()
        .await
}

pub struct PipelineExecutor {
    settings: PipelineSettings,
    collaborators: Collaborators,
    bus: EventBus,
    cancel: CancellationToken,
    run_id: Option<String>,
}

impl PipelineExecutor {
    pub fn new(
        settings: PipelineSettings,
        source: Arc<dyn RecordSource>,
        enricher: Arc<dyn Enricher>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            settings,
            collaborators: Collaborators {
                source,
                enricher,
                sink,
            },
            bus: EventBus::new(),
            cancel: CancellationToken::new(),
            run_id: None,
        }
    }

    /// Publishes pipeline events on `bus` instead of a private one.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub async fn run(self) -> Result<PipelineSummary, PipelineError> {
        let validated = SettingsValidator::new().validate(&self.settings)?;
        let run_id = self
            .run_id
            .unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));
        info!(run_id = %run_id, policy = %validated.policy(), "Launching pipeline");

        let metrics = Metrics::new();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();

        let coordinator = PipelineCoordinator::new(
            run_id.clone(),
            PipelineState::from_settings(&validated),
            fetch_tx,
            flush_tx,
            self.bus,
            metrics.clone(),
        );
        let (coordinator_ref, coordinator_handle) =
            spawn_actor("coordinator", validated.mailbox_capacity(), coordinator);

        let stages = workers::spawn(
            &run_id,
            &validated,
            self.collaborators,
            ControlChannels { fetch_rx, flush_rx },
            &coordinator_ref.sender(),
            &metrics,
        );

        let cancel_watch = watch_cancellation(self.cancel.clone(), coordinator_ref.downgrade());
        // The stages now hold the only strong senders to the mailbox.
        drop(coordinator_ref);

        let coordinator = coordinator_handle.await;
        cancel_watch.abort();
        let coordinator = coordinator.map_err(|err| {
            PipelineError::Actor(format!("coordinator failed: {err}"))
        })?;
        stages.join().await?;

        let summary = coordinator.into_summary()?;
        info!(
            run_id = %summary.run_id,
            delivered = summary.records_delivered,
            lost = summary.records_lost,
            batches = summary.batches_sent,
            elapsed_ms = summary.elapsed_ms,
            "Pipeline finished"
        );
        Ok(summary)
    }
}

/// Forwards a cancellation request to the coordinator while its mailbox is open.
pub(crate) fn watch_cancellation(
    cancel: CancellationToken,
    mailbox: mpsc::WeakSender<StageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;
        if let Some(tx) = mailbox.upgrade() {
            warn!("Cancellation requested, draining in-flight work");
            if tx.send(StageEvent::Cancelled).await.is_err() {
                debug!("Coordinator already stopped, cancellation skipped");
            }
        }
    })
}
