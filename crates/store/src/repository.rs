//! The storage interface the engine persists through.
//!
//! Every method returns `Result<T, StoreError>` so a database-backed
//! implementation can slot in without touching the engine.

use async_trait::async_trait;

use crate::models::{StepResultRow, WorkflowRow};
use crate::StoreError;

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetch a single workflow by id.
    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowRow>, StoreError>;

    /// Return all workflows ordered by id.
    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, StoreError>;

    /// Insert or fully replace a workflow.
    async fn put_workflow(&self, row: WorkflowRow) -> Result<(), StoreError>;

    /// Remove a workflow together with its execution history.
    ///
    /// Both go in one step: no reader may observe the definition gone but
    /// the history still present, or the reverse. Returns `false` if
    /// nothing was stored under `id`.
    async fn delete_workflow(&self, id: &str) -> Result<bool, StoreError>;

    /// Append step results to a workflow's history.
    async fn append_history(
        &self,
        workflow_id: &str,
        results: &[StepResultRow],
    ) -> Result<(), StoreError>;

    /// Accumulated history for a workflow, oldest first. Unknown ids yield
    /// an empty list.
    async fn history(&self, workflow_id: &str) -> Result<Vec<StepResultRow>, StoreError>;
}
