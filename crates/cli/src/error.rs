use engine_config::settings::error::SettingsError;
use engine_processing::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Pipeline run failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

impl CliError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CliError::ShutdownRequested | CliError::Pipeline(PipelineError::Cancelled)
        )
    }
}
