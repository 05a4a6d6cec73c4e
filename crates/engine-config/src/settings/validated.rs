use crate::settings::{AdvancePolicyKind, EnrichmentErrorMode};
use std::{num::NonZeroUsize, time::Duration};

/// Immutable, validated configuration used by every pipeline stage.
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub(crate) batch_size: NonZeroUsize,
    pub(crate) max_queue_size: NonZeroUsize,
    pub(crate) fetch_concurrency: NonZeroUsize,
    pub(crate) enrich_concurrency: NonZeroUsize,
    pub(crate) delivery_concurrency: NonZeroUsize,
    pub(crate) max_batch_size: NonZeroUsize,
    pub(crate) flush_timeout: Option<Duration>,
    pub(crate) policy: AdvancePolicyKind,
    pub(crate) on_enrichment_error: EnrichmentErrorMode,
    pub(crate) channel_capacity: NonZeroUsize,
    pub(crate) mailbox_capacity: NonZeroUsize,
}

impl ValidatedSettings {
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size.get()
    }

    pub fn fetch_concurrency(&self) -> NonZeroUsize {
        self.fetch_concurrency
    }

    pub fn enrich_concurrency(&self) -> NonZeroUsize {
        self.enrich_concurrency
    }

    pub fn delivery_concurrency(&self) -> NonZeroUsize {
        self.delivery_concurrency
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.get()
    }

    /// `None` when time-based flushing is disabled.
    pub fn flush_timeout(&self) -> Option<Duration> {
        self.flush_timeout
    }

    pub fn policy(&self) -> AdvancePolicyKind {
        self.policy
    }

    pub fn on_enrichment_error(&self) -> EnrichmentErrorMode {
        self.on_enrichment_error
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.get()
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity.get()
    }
}
