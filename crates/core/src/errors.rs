use thiserror::Error;

/// Failure of the external configuration store itself, as opposed to a
/// record simply being absent (absence is `Ok(None)`).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("configuration store unavailable: {0}")]
    Unavailable(String),
}

/// The only pipeline conditions surfaced to the caller as errors.
///
/// Everything else the pipeline can go wrong on (low confidence, abuse,
/// tool failure, guard block, missing parameters) is recovered as an
/// escalation response, never an `Err`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Message safe to show the end user; internals stay in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AgentNotFound { .. } => "The requested agent does not exist.",
            Self::Store(_) => "The service is temporarily unavailable. Please retry shortly.",
        }
    }
}
