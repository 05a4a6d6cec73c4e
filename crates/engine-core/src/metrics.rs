use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    pages_fetched: AtomicU64,
    records_fetched: AtomicU64,
    records_enriched: AtomicU64,
    records_lost: AtomicU64,
    records_delivered: AtomicU64,
    batches_flushed: AtomicU64,
    batches_delivered: AtomicU64,
    failure_count: AtomicU64,
}

/// Cheap, cloneable run counters. Stage workers bump them directly; they are
/// informational and never drive control decisions.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub records_enriched: u64,
    pub records_lost: u64,
    pub records_delivered: u64,
    pub batches_flushed: u64,
    pub batches_delivered: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_pages(&self, records: u64) {
        self.inner.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_fetched
            .fetch_add(records, Ordering::Relaxed);
    }

    pub fn increment_enriched(&self, count: u64) {
        self.inner
            .records_enriched
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_lost(&self, count: u64) {
        self.inner.records_lost.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_flushed(&self, count: u64) {
        self.inner.batches_flushed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_delivered(&self, records: u64) {
        self.inner.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_delivered
            .fetch_add(records, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_fetched: self.inner.pages_fetched.load(Ordering::Relaxed),
            records_fetched: self.inner.records_fetched.load(Ordering::Relaxed),
            records_enriched: self.inner.records_enriched.load(Ordering::Relaxed),
            records_lost: self.inner.records_lost.load(Ordering::Relaxed),
            records_delivered: self.inner.records_delivered.load(Ordering::Relaxed),
            batches_flushed: self.inner.batches_flushed.load(Ordering::Relaxed),
            batches_delivered: self.inner.batches_delivered.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
