use crate::{
    error::PipelineError,
    message::{BufferCommand, StageEvent},
    stage::report,
};
use engine_core::metrics::Metrics;
use model::records::{
    batch::{Batch, FlushTrigger},
    enriched::EnrichedRecord,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{debug, info};

// Placeholder period for the deadline when time-based flushing is off; the
// timer branch is disabled in that case and never fires.
const IDLE_PERIOD: Duration = Duration::from_secs(3600);

/// Accumulates enriched records into batches of at most `max_batch_size`.
///
/// A batch is flushed when it is full, when the rolling timer elapses, when
/// the coordinator asks for a settle flush, and once more when the input
/// closes. The timer restarts after every flush and every empty tick. A
/// flushed batch is never empty.
pub struct BatchBuffer {
    run_id: String,
    max_batch_size: usize,
    flush_timeout: Option<Duration>,
    metrics: Metrics,

    pending: Vec<EnrichedRecord>,
    received: u64,
    seq: u64,
    deadline: Instant,
}

impl BatchBuffer {
    pub fn new(
        run_id: impl Into<String>,
        max_batch_size: usize,
        flush_timeout: Option<Duration>,
        metrics: Metrics,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            max_batch_size: max_batch_size.max(1),
            flush_timeout,
            metrics,
            pending: Vec::with_capacity(max_batch_size),
            received: 0,
            seq: 0,
            deadline: Instant::now() + flush_timeout.unwrap_or(IDLE_PERIOD),
        }
    }

    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<EnrichedRecord>,
        mut commands: mpsc::UnboundedReceiver<BufferCommand>,
        output: mpsc::Sender<Batch>,
        events: mpsc::Sender<StageEvent>,
    ) {
        info!(
            max_batch_size = self.max_batch_size,
            flush_timeout = ?self.flush_timeout,
            "Batch buffer started"
        );
        self.restart_timer();
        let mut commands_open = true;

        loop {
            let step = tokio::select! {
                maybe = input.recv() => match maybe {
                    Some(record) => self.push(record, &output, &events).await,
                    None => break,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(BufferCommand::Flush { through }) => {
                        self.settle(through, &mut input, &output, &events).await
                    }
                    None => {
                        commands_open = false;
                        Ok(())
                    }
                },
                _ = time::sleep_until(self.deadline), if self.flush_timeout.is_some() => {
                    self.flush(FlushTrigger::Timeout, &output, &events).await
                }
            };

            if let Err(err) = step {
                report(&events, StageEvent::Failed(err)).await;
                return;
            }
        }

        if let Err(err) = self.flush(FlushTrigger::Drain, &output, &events).await {
            report(&events, StageEvent::Failed(err)).await;
            return;
        }
        info!(batches = self.seq, records = self.received, "Batch buffer drained");
    }

    async fn push(
        &mut self,
        record: EnrichedRecord,
        output: &mpsc::Sender<Batch>,
        events: &mpsc::Sender<StageEvent>,
    ) -> Result<(), PipelineError> {
        self.received += 1;
        self.pending.push(record);
        if self.pending.len() >= self.max_batch_size {
            self.flush(FlushTrigger::Full, output, events).await?;
        }
        Ok(())
    }

    /// Waits until `through` records have arrived in total, then flushes
    /// whatever is pending.
    async fn settle(
        &mut self,
        through: u64,
        input: &mut mpsc::Receiver<EnrichedRecord>,
        output: &mpsc::Sender<Batch>,
        events: &mpsc::Sender<StageEvent>,
    ) -> Result<(), PipelineError> {
        while self.received < through {
            match input.recv().await {
                Some(record) => self.push(record, output, events).await?,
                None => break,
            }
        }

        if self.pending.is_empty() {
            return Ok(());
        }
        self.flush(FlushTrigger::Settle, output, events).await
    }

    async fn flush(
        &mut self,
        trigger: FlushTrigger,
        output: &mpsc::Sender<Batch>,
        events: &mpsc::Sender<StageEvent>,
    ) -> Result<(), PipelineError> {
        self.restart_timer();
        if self.pending.is_empty() {
            return Ok(());
        }

        self.seq += 1;
        let records = std::mem::replace(&mut self.pending, Vec::with_capacity(self.max_batch_size));
        let batch = Batch::new(self.make_batch_id(), self.seq, records, trigger);

        self.metrics.increment_flushed(1);
        debug!(batch_id = %batch.id, rows = batch.len(), trigger = %trigger, "Batch flushed");
        report(
            events,
            StageEvent::BatchFlushed {
                batch_id: batch.id.clone(),
                size: batch.len(),
                trigger,
            },
        )
        .await;

        output
            .send(batch)
            .await
            .map_err(|_| PipelineError::Channel("delivery input closed".to_string()))
    }

    fn restart_timer(&mut self) {
        self.deadline = Instant::now() + self.flush_timeout.unwrap_or(IDLE_PERIOD);
    }

    fn make_batch_id(&self) -> String {
        let mut h = blake3::Hasher::new();
        h.update(self.run_id.as_bytes());
        h.update(&self.seq.to_le_bytes());
        h.finalize().to_hex().to_string()
    }
}
