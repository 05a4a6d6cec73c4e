use crate::error::CliError;
use clap::{Args, Subcommand, ValueEnum};
use engine_config::settings::{
    AdvancePolicyKind, EnrichmentErrorMode, PipelineSettings, load_settings,
};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline over the simulated company directory
    Run {
        #[command(flatten)]
        settings: SettingsArgs,

        #[arg(long, default_value_t = 100, help = "Number of companies in the source")]
        records: usize,

        #[arg(long, help = "Fail the orders lookup for every n-th company")]
        fail_every: Option<u64>,

        #[arg(long, help = "Print the summary as JSON")]
        json: bool,

        #[arg(
            long,
            help = "If specified, writes the JSON summary to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Validate settings and print the values the pipeline would use
    Validate {
        #[command(flatten)]
        settings: SettingsArgs,

        #[arg(long, help = "Print the validated settings as JSON")]
        json: bool,
    },
    /// Compare both advance policies over repeated runs
    Bench {
        #[command(flatten)]
        settings: SettingsArgs,

        #[arg(long, default_value_t = 100)]
        records: usize,

        #[arg(long, default_value_t = 3)]
        repetitions: usize,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    QueueBounded,
    BatchGated,
}

impl From<PolicyArg> for AdvancePolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::QueueBounded => AdvancePolicyKind::QueueBounded,
            PolicyArg::BatchGated => AdvancePolicyKind::BatchGated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorModeArg {
    Drop,
    Fail,
}

impl From<ErrorModeArg> for EnrichmentErrorMode {
    fn from(arg: ErrorModeArg) -> Self {
        match arg {
            ErrorModeArg::Drop => EnrichmentErrorMode::Drop,
            ErrorModeArg::Fail => EnrichmentErrorMode::Fail,
        }
    }
}

/// Settings file plus per-field overrides. Flags win over the file.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    #[arg(long, help = "Settings file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub max_queue_size: Option<usize>,

    #[arg(long)]
    pub max_batch_size: Option<usize>,

    #[arg(long)]
    pub fetch_concurrency: Option<usize>,

    #[arg(long)]
    pub enrich_concurrency: Option<usize>,

    #[arg(long)]
    pub delivery_concurrency: Option<usize>,

    #[arg(long, help = "0 disables time-based flushing")]
    pub flush_timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    #[arg(long, value_enum)]
    pub on_enrichment_error: Option<ErrorModeArg>,
}

impl SettingsArgs {
    pub async fn resolve(&self) -> Result<PipelineSettings, CliError> {
        let base = match &self.config {
            Some(path) => load_settings(path).await?,
            None => PipelineSettings::default(),
        };
        Ok(self.apply(base))
    }

    fn apply(&self, mut settings: PipelineSettings) -> PipelineSettings {
        if let Some(v) = self.batch_size {
            settings.batch_size = v;
        }
        if let Some(v) = self.max_queue_size {
            settings.max_queue_size = v;
        }
        if let Some(v) = self.max_batch_size {
            settings.max_batch_size = v;
        }
        if let Some(v) = self.fetch_concurrency {
            settings.fetch_concurrency = v;
        }
        if let Some(v) = self.enrich_concurrency {
            settings.enrich_concurrency = v;
        }
        if let Some(v) = self.delivery_concurrency {
            settings.delivery_concurrency = v;
        }
        if let Some(v) = self.flush_timeout_ms {
            settings.flush_timeout_ms = v;
        }
        if let Some(policy) = self.policy {
            settings.policy = policy.into();
        }
        if let Some(mode) = self.on_enrichment_error {
            settings.on_enrichment_error = mode.into();
        }
        settings
    }
}
