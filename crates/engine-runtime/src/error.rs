use engine_processing::error::PipelineError;
use thiserror::Error;

/// Common error type for all actors in the engine.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Actor internal error: {0}")]
    Internal(String),
}

impl From<ActorError> for PipelineError {
    fn from(err: ActorError) -> Self {
        PipelineError::Actor(err.to_string())
    }
}
