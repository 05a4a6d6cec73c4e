//! Simulated collaborators used by the CLI demo and benchmarks.
//!
//! They model a company directory (paged source), an orders lookup per
//! company (enricher) and a bulk e-mail API (sink). Random draws are seeded
//! from record ids so repeated runs behave the same.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::Duration;

pub mod enricher;
pub mod sink;
pub mod source;

pub use enricher::{Anomaly, SimulatedOrderEnricher};
pub use sink::SimulatedEmailSink;
pub use source::SimulatedCompanySource;

/// Inclusive latency range in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn sample(&self, key: u64) -> Duration {
        Duration::from_millis(draw(key, self.min_ms, self.max_ms))
    }
}

/// Value in `[min, max]` drawn from an rng seeded with `key`.
pub(crate) fn draw(key: u64, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    StdRng::seed_from_u64(key).gen_range(min..=max)
}
