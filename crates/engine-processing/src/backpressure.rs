use crate::error::PipelineError;

/// Cumulative counts of records moving through the pipeline.
///
/// Updated only by the coordinator, one event at a time. Every update checks
/// that no stage has reported more records than the stage before it, so
/// `delivered <= flushed <= enriched <= fetched - lost` always holds and the
/// queue depth can never go negative.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackpressureAccumulator {
    total_fetched: u64,
    total_enriched: u64,
    total_lost: u64,
    total_flushed: u64,
    total_delivered: u64,
    pages_fetched: u64,
    batches_sent: u64,
}

impl BackpressureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&mut self, count: usize) {
        if count > 0 {
            self.pages_fetched += 1;
        }
        self.total_fetched += count as u64;
    }

    pub fn record_enriched(&mut self) -> Result<(), PipelineError> {
        self.ensure_in_enrichment("enriched")?;
        self.total_enriched += 1;
        Ok(())
    }

    pub fn record_lost(&mut self) -> Result<(), PipelineError> {
        self.ensure_in_enrichment("lost")?;
        self.total_lost += 1;
        Ok(())
    }

    pub fn record_flushed(&mut self, size: usize) -> Result<(), PipelineError> {
        let flushed = self.total_flushed + size as u64;
        if flushed > self.total_enriched {
            return Err(PipelineError::InvariantViolation(format!(
                "flushed {flushed} records but only {} were enriched",
                self.total_enriched
            )));
        }
        self.total_flushed = flushed;
        Ok(())
    }

    /// Records a delivery acknowledgement and returns the new queue depth.
    pub fn record_delivered(&mut self, size: usize) -> Result<u64, PipelineError> {
        let delivered = self.total_delivered + size as u64;
        if delivered > self.total_flushed {
            return Err(PipelineError::InvariantViolation(format!(
                "delivered {delivered} records but only {} were flushed",
                self.total_flushed
            )));
        }
        self.total_delivered = delivered;
        self.batches_sent += 1;
        self.queue_depth()
    }

    /// Records fetched but not yet delivered.
    pub fn queue_depth(&self) -> Result<u64, PipelineError> {
        self.total_fetched
            .checked_sub(self.total_delivered)
            .ok_or_else(|| {
                PipelineError::InvariantViolation(format!(
                    "delivered {} exceeds fetched {}",
                    self.total_delivered, self.total_fetched
                ))
            })
    }

    /// Records that left the pipeline, delivered or lost.
    pub fn settled(&self) -> u64 {
        self.total_delivered + self.total_lost
    }

    /// Records fetched whose enrichment has not reported yet.
    pub fn in_enrichment(&self) -> u64 {
        self.total_fetched
            .saturating_sub(self.total_enriched + self.total_lost)
    }

    /// Records enriched but not yet part of a flushed batch.
    pub fn in_buffer(&self) -> u64 {
        self.total_enriched.saturating_sub(self.total_flushed)
    }

    /// No stage holds a fetched record: every one was delivered or lost.
    pub fn is_idle(&self) -> bool {
        self.total_fetched == self.settled()
    }

    /// Confirms every fetched record was delivered or reported lost.
    pub fn verify_complete(&self) -> Result<(), PipelineError> {
        if self.total_fetched != self.settled() {
            return Err(PipelineError::InvariantViolation(format!(
                "fetched {} records but delivered {} and lost {}",
                self.total_fetched, self.total_delivered, self.total_lost
            )));
        }
        Ok(())
    }

    pub fn total_fetched(&self) -> u64 {
        self.total_fetched
    }

    pub fn total_enriched(&self) -> u64 {
        self.total_enriched
    }

    pub fn total_lost(&self) -> u64 {
        self.total_lost
    }

    pub fn total_delivered(&self) -> u64 {
        self.total_delivered
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    fn ensure_in_enrichment(&self, outcome: &str) -> Result<(), PipelineError> {
        if self.in_enrichment() == 0 {
            return Err(PipelineError::InvariantViolation(format!(
                "record {outcome} with no record awaiting enrichment"
            )));
        }
        Ok(())
    }
}
