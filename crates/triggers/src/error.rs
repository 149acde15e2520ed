//! Trigger-level error type.

use thiserror::Error;

/// Errors returned by a trigger's `execute` method.
///
/// Every variant is a step failure from the engine's point of view: it is
/// recorded against the step and halts the rest of the chain. The `Display`
/// text is what ends up in the step's result.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The step's parameter map could not be turned into the trigger's params.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The trigger ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// Spawning or talking to a child process failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl TriggerError {
    /// Shorthand for [`TriggerError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
