use crate::{
    backpressure::BackpressureAccumulator,
    controller::{OffsetController, policy::policy_for},
    error::PipelineError,
    message::{FetchRequest, StageEvent},
};
use engine_config::settings::validated::ValidatedSettings;
use model::{
    execution::{loss::EnrichmentLoss, phase::PipelinePhase},
    pagination::cursor::Cursor,
};
use tracing::{debug, error, warn};

/// Work the coordinator must hand to the stages after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Fetch(FetchRequest),
    /// Ask the buffer to flush everything up to `through` enriched records.
    Flush { through: u64 },
    /// No more page requests will ever be issued; close the fetch queue.
    CloseIntake,
}

/// All mutable pipeline state, owned by the coordinator.
///
/// Stage events are applied one at a time through [`PipelineState::apply`],
/// which returns the directives that follow from the new state.
#[derive(Debug)]
pub struct PipelineState {
    controller: OffsetController,
    counters: BackpressureAccumulator,
    phase: PipelinePhase,
    outstanding_fetches: usize,
    flush_requested_through: u64,
    intake_closed: bool,
    losses: Vec<EnrichmentLoss>,
    failure: Option<PipelineError>,
}

impl PipelineState {
    pub fn new(controller: OffsetController) -> Self {
        Self {
            controller,
            counters: BackpressureAccumulator::new(),
            phase: PipelinePhase::Idle,
            outstanding_fetches: 0,
            flush_requested_through: 0,
            intake_closed: false,
            losses: Vec::new(),
            failure: None,
        }
    }

    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        Self::new(OffsetController::new(
            policy_for(settings.policy()),
            settings.batch_size(),
            settings.max_queue_size(),
        ))
    }

    /// Moves to `Running` and requests the first page.
    pub fn start(&mut self) -> Vec<Directive> {
        if self.phase == PipelinePhase::Idle {
            self.phase = PipelinePhase::Running;
        }

        let mut directives = Vec::new();
        if let Some(request) = self.controller.start() {
            self.outstanding_fetches += 1;
            directives.push(Directive::Fetch(request));
        }
        self.close_intake_if_done(&mut directives);
        self.drain_if_idle();
        directives
    }

    pub fn apply(&mut self, event: StageEvent) -> Vec<Directive> {
        if let Err(e) = self.update(event) {
            self.fail(e);
        }
        self.directives()
    }

    /// Records a fatal error. Only the first one is kept.
    pub fn fail(&mut self, err: PipelineError) {
        self.controller.halt();
        if self.failure.is_some() {
            warn!(kind = err.kind(), error = %err, "Additional failure while settling");
            return;
        }

        error!(kind = err.kind(), error = %err, "Pipeline failed, draining in-flight work");
        self.failure = Some(err);
        self.phase = PipelinePhase::Failed;
    }

    /// Settles the run once every stage has drained.
    pub fn settle(&mut self) -> Result<(), PipelineError> {
        let outcome = match self.failure.take() {
            Some(err) => Err(err),
            None if !self.controller.is_exhausted() => Err(PipelineError::InvariantViolation(
                "stages drained before the source was exhausted".to_string(),
            )),
            None => self.counters.verify_complete(),
        };

        self.phase = match outcome {
            Ok(()) => PipelinePhase::Complete,
            Err(_) => PipelinePhase::Failed,
        };
        outcome
    }

    fn update(&mut self, event: StageEvent) -> Result<(), PipelineError> {
        debug!(event = event.name(), "Applying stage event");
        match event {
            StageEvent::PageFetched { count, .. } => {
                self.fetch_returned();
                self.controller.on_page(count);
                self.counters.record_page(count);
            }
            StageEvent::SourceExhausted { cursor } => {
                self.fetch_returned();
                self.controller.on_page(0);
                self.controller.mark_exhausted(cursor);
            }
            StageEvent::FetchFailed { error, .. } => {
                self.fetch_returned();
                return Err(error);
            }
            StageEvent::RecordEnriched { .. } => self.counters.record_enriched()?,
            StageEvent::RecordLost(loss) => {
                self.counters.record_lost()?;
                self.losses.push(loss);
            }
            StageEvent::BatchFlushed { size, .. } => self.counters.record_flushed(size)?,
            StageEvent::BatchDelivered { size, .. } => {
                self.counters.record_delivered(size)?;
            }
            StageEvent::Failed(error) => return Err(error),
            StageEvent::Cancelled => return Err(PipelineError::Cancelled),
        }
        Ok(())
    }

    fn fetch_returned(&mut self) {
        self.outstanding_fetches = self.outstanding_fetches.saturating_sub(1);
    }

    fn directives(&mut self) -> Vec<Directive> {
        let mut directives: Vec<Directive> = self
            .controller
            .advance(self.counters.settled())
            .into_iter()
            .map(Directive::Fetch)
            .collect();
        self.outstanding_fetches += directives.len();

        self.close_intake_if_done(&mut directives);
        if let Some(through) = self.settle_flush() {
            directives.push(Directive::Flush { through });
        }
        self.drain_if_idle();
        directives
    }

    fn close_intake_if_done(&mut self, directives: &mut Vec<Directive>) {
        if self.intake_closed || self.controller.accepting() || self.outstanding_fetches > 0 {
            return;
        }

        self.intake_closed = true;
        directives.push(Directive::CloseIntake);
    }

    /// `Draining` begins once the source is done and no stage holds a
    /// record any more; only the stage shutdown is left.
    fn drain_if_idle(&mut self) {
        if self.phase == PipelinePhase::Running && self.intake_closed && self.counters.is_idle() {
            self.phase = PipelinePhase::Draining;
        }
    }

    /// A flush is needed when nothing upstream can add to the open batch:
    /// no page is outstanding, no record is being enriched and the policy
    /// will not request another page until the buffered records settle.
    fn settle_flush(&mut self) -> Option<u64> {
        if self.intake_closed
            || self.outstanding_fetches > 0
            || self.counters.in_enrichment() > 0
            || self.counters.in_buffer() == 0
            || self.controller.may_advance(self.counters.settled())
        {
            return None;
        }

        let through = self.counters.total_enriched();
        if through <= self.flush_requested_through {
            return None;
        }
        self.flush_requested_through = through;
        Some(through)
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn counters(&self) -> &BackpressureAccumulator {
        &self.counters
    }

    pub fn controller(&self) -> &OffsetController {
        &self.controller
    }

    pub fn total_fetched(&self) -> u64 {
        self.counters.total_fetched()
    }

    pub fn total_delivered(&self) -> u64 {
        self.counters.total_delivered()
    }

    pub fn current_cursor(&self) -> Option<Cursor> {
        self.controller.last_cursor()
    }

    pub fn completion_flag(&self) -> bool {
        self.controller.is_exhausted()
    }

    pub fn queue_depth(&self) -> u64 {
        self.total_fetched().saturating_sub(self.total_delivered())
    }

    pub fn outstanding_fetches(&self) -> usize {
        self.outstanding_fetches
    }

    pub fn losses(&self) -> &[EnrichmentLoss] {
        &self.losses
    }

    pub fn take_losses(&mut self) -> Vec<EnrichmentLoss> {
        std::mem::take(&mut self.losses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::policy::{AdvancePolicy, BatchGatedPolicy, QueueBoundedPolicy};
    use connectors::error::ConnectorError;
    use model::records::{batch::FlushTrigger, record::RecordId};

    fn state(policy: Box<dyn AdvancePolicy>, max_queue: usize) -> PipelineState {
        PipelineState::new(OffsetController::new(policy, 5, max_queue))
    }

    fn fetch_offsets(directives: &[Directive]) -> Vec<usize> {
        directives
            .iter()
            .filter_map(|d| match d {
                Directive::Fetch(r) => Some(r.cursor.offset()),
                _ => None,
            })
            .collect()
    }

    fn page(state: &mut PipelineState, offset: usize, count: usize) -> Vec<Directive> {
        let cursor = Cursor::at(offset);
        if count == 0 {
            return state.apply(StageEvent::SourceExhausted { cursor });
        }
        state.apply(StageEvent::PageFetched { cursor, count })
    }

    fn enrich(state: &mut PipelineState, n: u64) -> Vec<Directive> {
        let mut last = Vec::new();
        for id in 0..n {
            last = state.apply(StageEvent::RecordEnriched {
                record_id: RecordId(id),
            });
        }
        last
    }

    fn flush_and_deliver(state: &mut PipelineState, size: usize) -> Vec<Directive> {
        state.apply(StageEvent::BatchFlushed {
            batch_id: "b".into(),
            size,
            trigger: FlushTrigger::Full,
        });
        state.apply(StageEvent::BatchDelivered {
            batch_id: "b".into(),
            size,
        })
    }

    #[test]
    fn batch_gated_run_settles_complete() {
        let mut state = state(Box::new(BatchGatedPolicy), 15);
        assert_eq!(fetch_offsets(&state.start()), vec![0]);
        assert_eq!(state.phase(), PipelinePhase::Running);

        assert!(page(&mut state, 0, 5).is_empty());
        enrich(&mut state, 5);
        assert_eq!(fetch_offsets(&flush_and_deliver(&mut state, 5)), vec![5]);

        page(&mut state, 5, 5);
        enrich(&mut state, 5);
        assert_eq!(fetch_offsets(&flush_and_deliver(&mut state, 5)), vec![10]);

        page(&mut state, 10, 2);
        // The short page sits in the buffer until a settle flush is asked for.
        assert_eq!(enrich(&mut state, 2), vec![Directive::Flush { through: 12 }]);
        assert_eq!(fetch_offsets(&flush_and_deliver(&mut state, 2)), vec![15]);

        assert_eq!(page(&mut state, 15, 0), vec![Directive::CloseIntake]);
        assert_eq!(state.phase(), PipelinePhase::Draining);
        assert!(state.completion_flag());

        state.settle().unwrap();
        assert_eq!(state.phase(), PipelinePhase::Complete);
        assert_eq!(
            state.controller().cursor_sequence(),
            &[Cursor::at(0), Cursor::at(5), Cursor::at(10), Cursor::at(15)]
        );
        assert_eq!(state.total_delivered(), 12);
    }

    #[test]
    fn queue_bounded_keeps_pages_in_flight() {
        let mut state = state(Box::new(QueueBoundedPolicy), 15);
        state.start();

        assert_eq!(fetch_offsets(&page(&mut state, 0, 5)), vec![5, 10]);
        assert_eq!(state.outstanding_fetches(), 2);
        assert_eq!(state.queue_depth(), 5);
    }

    #[test]
    fn intake_waits_for_outstanding_fetches() {
        let mut state = state(Box::new(QueueBoundedPolicy), 15);
        state.start();
        page(&mut state, 0, 5);

        // Cursor 5 comes back empty while cursor 10 is still in flight.
        assert!(!page(&mut state, 5, 0).contains(&Directive::CloseIntake));
        assert!(page(&mut state, 10, 0).contains(&Directive::CloseIntake));
    }

    #[test]
    fn draining_waits_for_buffered_records() {
        let mut state = state(Box::new(QueueBoundedPolicy), 15);
        state.start();
        page(&mut state, 0, 5);
        page(&mut state, 5, 0);
        assert!(page(&mut state, 10, 0).contains(&Directive::CloseIntake));
        assert_eq!(state.phase(), PipelinePhase::Running);

        enrich(&mut state, 5);
        assert_eq!(state.phase(), PipelinePhase::Running);
        state.apply(StageEvent::BatchFlushed {
            batch_id: "b".into(),
            size: 5,
            trigger: FlushTrigger::Drain,
        });
        assert_eq!(state.phase(), PipelinePhase::Running);

        state.apply(StageEvent::BatchDelivered {
            batch_id: "b".into(),
            size: 5,
        });
        assert_eq!(state.phase(), PipelinePhase::Draining);
        state.settle().unwrap();
        assert_eq!(state.phase(), PipelinePhase::Complete);
    }

    #[test]
    fn losses_count_as_settled() {
        let mut state = state(Box::new(BatchGatedPolicy), 15);
        state.start();
        page(&mut state, 0, 5);
        enrich(&mut state, 4);
        let directives = state.apply(StageEvent::RecordLost(EnrichmentLoss::new(
            RecordId(4),
            "lookup failed",
        )));
        assert_eq!(directives, vec![Directive::Flush { through: 4 }]);

        assert_eq!(fetch_offsets(&flush_and_deliver(&mut state, 4)), vec![5]);
        assert_eq!(state.losses().len(), 1);
    }

    #[test]
    fn fatal_error_halts_and_keeps_first() {
        let mut state = state(Box::new(QueueBoundedPolicy), 15);
        state.start();

        let directives = state.apply(StageEvent::FetchFailed {
            cursor: Cursor::start(),
            error: PipelineError::SourceFetch {
                cursor: Cursor::start(),
                source: ConnectorError::Rejected("quota".into()),
            },
        });
        assert_eq!(directives, vec![Directive::CloseIntake]);
        assert_eq!(state.phase(), PipelinePhase::Failed);

        state.apply(StageEvent::Cancelled);
        let err = state.settle().unwrap_err();
        assert_eq!(err.kind(), "source_fetch");
    }

    #[test]
    fn accounting_error_fails_the_run() {
        let mut state = state(Box::new(QueueBoundedPolicy), 15);
        state.start();
        state.apply(StageEvent::BatchDelivered {
            batch_id: "ghost".into(),
            size: 1,
        });

        assert_eq!(state.phase(), PipelinePhase::Failed);
        assert!(matches!(
            state.settle(),
            Err(PipelineError::InvariantViolation(_))
        ));
    }
}
