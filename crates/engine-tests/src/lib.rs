#![allow(dead_code)]

use engine_config::settings::{AdvancePolicyKind, PipelineSettings};

pub mod engine;
pub mod utils;

/// Page size used by every scenario.
pub const BATCH_SIZE: usize = 5;

/// Settings shared by the scenarios: pages of five, batches of five, no
/// time-based flushing unless a test turns it on.
pub fn scenario_settings(policy: AdvancePolicyKind, max_queue_size: usize) -> PipelineSettings {
    PipelineSettings::default()
        .with_batch_size(BATCH_SIZE)
        .with_max_batch_size(BATCH_SIZE)
        .with_max_queue_size(max_queue_size)
        .with_flush_timeout_ms(0)
        .with_policy(policy)
}
