use thiserror::Error;

/// Errors raised while loading or validating pipeline settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// One or more settings violate the pipeline's sizing rules. The pipeline
    /// never starts.
    #[error("Invalid pipeline settings: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SettingsError {
    /// The individual rule violations, if this is a validation failure.
    pub fn violations(&self) -> &[String] {
        match self {
            SettingsError::ValidationFailed(errors) => errors,
            _ => &[],
        }
    }
}
