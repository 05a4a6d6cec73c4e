use crate::settings::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

pub mod error;
pub mod validated;
pub mod validator;

/// How the offset controller decides to request the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicyKind {
    /// Keep requesting pages while the queue stays under `max_queue_size`.
    #[default]
    QueueBounded,
    /// Request the next page only once the previous one is fully settled.
    BatchGated,
}

impl fmt::Display for AdvancePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvancePolicyKind::QueueBounded => f.write_str("queue_bounded"),
            AdvancePolicyKind::BatchGated => f.write_str("batch_gated"),
        }
    }
}

/// What to do when a single record's enrichment lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentErrorMode {
    /// Drop the record, report it as a loss and keep going.
    #[default]
    Drop,
    /// Treat the failure as fatal for the whole run.
    Fail,
}

/// Raw, user-supplied pipeline settings. Every field has a default, so a
/// settings file only needs the values it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Records requested per source page.
    #[serde(alias = "batchSize")]
    pub batch_size: usize,

    /// Upper bound on records fetched but not yet delivered.
    #[serde(alias = "maxQueueSize")]
    pub max_queue_size: usize,

    #[serde(alias = "fetchConcurrency")]
    pub fetch_concurrency: usize,

    #[serde(alias = "enrichConcurrency")]
    pub enrich_concurrency: usize,

    #[serde(alias = "deliveryConcurrency")]
    pub delivery_concurrency: usize,

    /// Largest batch handed to the sink.
    #[serde(alias = "maxBatchSize")]
    pub max_batch_size: usize,

    /// Rolling buffer timeout; `0` disables time-based flushing.
    #[serde(alias = "flushTimeoutMs")]
    pub flush_timeout_ms: u64,

    pub policy: AdvancePolicyKind,

    #[serde(alias = "onEnrichmentError")]
    pub on_enrichment_error: EnrichmentErrorMode,

    /// Capacity of the channels between stages.
    #[serde(alias = "channelCapacity")]
    pub channel_capacity: usize,

    /// Capacity of the coordinator mailbox.
    #[serde(alias = "mailboxCapacity")]
    pub mailbox_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_queue_size: 15,
            fetch_concurrency: 1,
            enrich_concurrency: 5,
            delivery_concurrency: 5,
            max_batch_size: 5,
            flush_timeout_ms: 500,
            policy: AdvancePolicyKind::QueueBounded,
            on_enrichment_error: EnrichmentErrorMode::Drop,
            channel_capacity: 64,
            mailbox_capacity: 256,
        }
    }
}

impl PipelineSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&json)
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_concurrency(mut self, fetch: usize, enrich: usize, delivery: usize) -> Self {
        self.fetch_concurrency = fetch;
        self.enrich_concurrency = enrich;
        self.delivery_concurrency = delivery;
        self
    }

    pub fn with_flush_timeout_ms(mut self, ms: u64) -> Self {
        self.flush_timeout_ms = ms;
        self
    }

    pub fn with_policy(mut self, policy: AdvancePolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_enrichment_errors(mut self, mode: EnrichmentErrorMode) -> Self {
        self.on_enrichment_error = mode;
        self
    }
}

/// Reads and parses a JSON settings file.
pub async fn load_settings(path: impl AsRef<Path>) -> Result<PipelineSettings, SettingsError> {
    PipelineSettings::load(path).await
}
