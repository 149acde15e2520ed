//! Engine-level error types.

use thiserror::Error;

/// Errors that reject an engine call outright.
///
/// Trigger failures are not errors here; they come back as failed
/// [`ExecutionResult`](crate::ExecutionResult)s.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No workflow is stored under the requested id.
    #[error("Workflow not found")]
    WorkflowNotFound(String),

    /// A workflow with the requested id is already stored.
    #[error("Workflow already exists")]
    AlreadyExists(String),

    /// A run for this workflow id is already in flight.
    #[error("Workflow already running")]
    AlreadyRunning(String),

    /// A `firstStepId` or `nextStepId` points at a step that doesn't exist.
    #[error("Step {0} not found")]
    StepNotFound(String),

    /// The step chain led back to a step that already ran in this run.
    #[error("Step {0} was reached twice; the step chain contains a cycle")]
    CycleDetected(String),

    /// Persistence error from the store crate.
    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WorkflowNotFound(_) | Self::StepNotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::AlreadyRunning(_))
    }
}
