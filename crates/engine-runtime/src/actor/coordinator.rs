use crate::{
    actor::{Actor, ActorContext},
    error::ActorError,
};
use async_trait::async_trait;
use chrono::Utc;
use engine_config::report::summary::PipelineSummary;
use engine_core::{event_bus::bus::EventBus, metrics::Metrics};
use engine_processing::{
    error::PipelineError,
    message::{BufferCommand, FetchRequest, StageEvent},
    state::{Directive, PipelineState},
};
use model::{
    events::pipeline::{
        BatchDelivered, BatchFlushed, PageFetched, PageRequested, PhaseChanged, PipelineCompleted,
        PipelineFailed, PipelineStarted, RecordLost, SourceExhausted,
    },
    execution::phase::PipelinePhase,
};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// The pipeline's single serialization point.
///
/// Owns the offset controller and the backpressure counters. Stage workers
/// report into its mailbox; it answers with fetch requests and flush
/// commands on unbounded channels, so it never waits on a stage.
///
/// It holds no sender to its own mailbox: once it closes the fetch queue the
/// stages wind down one after another, the last mailbox sender drops and the
/// run settles in `on_stop`.
pub struct PipelineCoordinator {
    run_id: String,
    state: PipelineState,
    fetch_tx: Option<mpsc::UnboundedSender<FetchRequest>>,
    flush_tx: mpsc::UnboundedSender<BufferCommand>,
    bus: EventBus,
    metrics: Metrics,
    started_at: Instant,
    outcome: Option<Result<(), PipelineError>>,
}

impl PipelineCoordinator {
    pub fn new(
        run_id: impl Into<String>,
        state: PipelineState,
        fetch_tx: mpsc::UnboundedSender<FetchRequest>,
        flush_tx: mpsc::UnboundedSender<BufferCommand>,
        bus: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            state,
            fetch_tx: Some(fetch_tx),
            flush_tx,
            bus,
            metrics,
            started_at: Instant::now(),
            outcome: None,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Turns the settled run into its summary, or the first fatal error.
    pub fn into_summary(mut self) -> Result<PipelineSummary, PipelineError> {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            Err(ActorError::Internal("coordinator stopped before settling".to_string()).into())
        });
        outcome?;

        let losses = self.state.take_losses();
        let counters = *self.state.counters();
        let controller = self.state.controller();
        Ok(PipelineSummary {
            run_id: self.run_id.clone(),
            policy: controller.policy().kind(),
            records_fetched: counters.total_fetched(),
            records_enriched: counters.total_enriched(),
            records_delivered: counters.total_delivered(),
            records_lost: counters.total_lost(),
            pages_fetched: counters.pages_fetched(),
            batches_sent: counters.batches_sent(),
            last_cursor: controller.last_cursor(),
            cursor_sequence: controller.cursor_sequence().to_vec(),
            losses,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
            metrics: self.metrics.snapshot(),
        })
    }

    async fn dispatch(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Fetch(request) => self.request_page(request).await,
                Directive::Flush { through } => {
                    debug!(through, "Requesting settle flush");
                    if self.flush_tx.send(BufferCommand::Flush { through }).is_err() {
                        debug!("Batch buffer already stopped, flush skipped");
                    }
                }
                Directive::CloseIntake => {
                    info!(
                        run_id = %self.run_id,
                        last_cursor = ?self.state.current_cursor(),
                        "No further pages will be requested, draining"
                    );
                    self.fetch_tx = None;
                }
            }
        }
    }

    async fn request_page(&mut self, request: FetchRequest) {
        let queue_depth = self.state.queue_depth() as usize;
        debug!(cursor = %request.cursor, queue_depth, "Requesting page");
        self.bus
            .publish(PageRequested {
                run_id: self.run_id.clone(),
                cursor: request.cursor,
                queue_depth,
                timestamp: Utc::now(),
            })
            .await;

        let sent = match &self.fetch_tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        };
        if !sent {
            self.state.fail(PipelineError::Channel(
                "fetch stage stopped accepting requests".to_string(),
            ));
        }
    }

    async fn publish_stage_event(&self, event: &StageEvent) {
        let run_id = self.run_id.clone();
        let timestamp = Utc::now();
        match event {
            StageEvent::PageFetched { cursor, count } => {
                self.bus
                    .publish(PageFetched {
                        run_id,
                        cursor: *cursor,
                        record_count: *count,
                        timestamp,
                    })
                    .await
            }
            StageEvent::SourceExhausted { cursor } => {
                self.bus
                    .publish(SourceExhausted {
                        run_id,
                        cursor: *cursor,
                        timestamp,
                    })
                    .await
            }
            StageEvent::RecordLost(loss) => {
                self.bus
                    .publish(RecordLost {
                        run_id,
                        record_id: loss.record_id,
                        error: loss.error.clone(),
                        timestamp,
                    })
                    .await
            }
            StageEvent::BatchFlushed {
                batch_id,
                size,
                trigger,
            } => {
                self.bus
                    .publish(BatchFlushed {
                        run_id,
                        batch_id: batch_id.clone(),
                        record_count: *size,
                        trigger: *trigger,
                        timestamp,
                    })
                    .await
            }
            _ => {}
        }
    }

    async fn publish_phase_change(&self, from: PipelinePhase) {
        let to = self.state.phase();
        if from == to {
            return;
        }

        info!(run_id = %self.run_id, from = %from, to = %to, "Pipeline phase changed");
        self.bus
            .publish(PhaseChanged {
                run_id: self.run_id.clone(),
                from,
                to,
                timestamp: Utc::now(),
            })
            .await;
    }
}

#[async_trait]
impl Actor<StageEvent> for PipelineCoordinator {
    async fn on_start(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(
            actor = ctx.name(),
            run_id = %self.run_id,
            policy = %self.state.controller().policy().kind(),
            "Pipeline starting"
        );
        self.started_at = Instant::now();
        self.bus
            .publish(PipelineStarted {
                run_id: self.run_id.clone(),
                timestamp: Utc::now(),
            })
            .await;

        let before = self.state.phase();
        let directives = self.state.start();
        self.publish_phase_change(before).await;
        self.dispatch(directives).await;
        Ok(())
    }

    async fn handle(&mut self, msg: StageEvent, _ctx: &ActorContext) -> Result<(), ActorError> {
        self.publish_stage_event(&msg).await;
        let delivered = match &msg {
            StageEvent::BatchDelivered { batch_id, size } => Some((batch_id.clone(), *size)),
            _ => None,
        };

        let before = self.state.phase();
        let directives = self.state.apply(msg);

        if let Some((batch_id, record_count)) = delivered {
            self.bus
                .publish(BatchDelivered {
                    run_id: self.run_id.clone(),
                    batch_id,
                    record_count,
                    queue_depth: self.state.queue_depth() as usize,
                    timestamp: Utc::now(),
                })
                .await;
        }

        self.publish_phase_change(before).await;
        self.dispatch(directives).await;
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        // Every stage has dropped its mailbox sender, so nothing is in flight.
        self.fetch_tx = None;
        let before = self.state.phase();
        let outcome = self.state.settle();
        self.publish_phase_change(before).await;

        let duration_ms = self.started_at.elapsed().as_millis() as u64;
        match &outcome {
            Ok(()) => {
                info!(
                    run_id = %self.run_id,
                    delivered = self.state.total_delivered(),
                    lost = self.state.counters().total_lost(),
                    duration_ms,
                    "Pipeline completed"
                );
                self.bus
                    .publish(PipelineCompleted {
                        run_id: self.run_id.clone(),
                        records_delivered: self.state.total_delivered(),
                        duration_ms,
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            Err(err) => {
                error!(run_id = %self.run_id, kind = err.kind(), error = %err, "Pipeline failed");
                self.bus
                    .publish(PipelineFailed {
                        run_id: self.run_id.clone(),
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
        }

        self.outcome = Some(outcome);
        Ok(())
    }
}
