//! `engine` crate — workflow domain models, structural validation and the
//! execution engine.

pub mod error;
pub mod executor;
pub mod models;
pub mod validate;

pub use error::EngineError;
pub use executor::{WorkflowEngine, CANCELLED_MESSAGE};
pub use models::{
    ExecutionContext, ExecutionResult, ExecutionStatus, Workflow, WorkflowDraft, WorkflowStatus,
    WorkflowStep,
};
pub use validate::{validate_draft, validate_workflow};

#[cfg(test)]
mod executor_tests;
