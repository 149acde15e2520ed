//! In-memory store for tests and single-process deployments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{StepResultRow, WorkflowRow};
use crate::repository::WorkflowStore;
use crate::StoreError;

#[derive(Default)]
struct Tables {
    workflows: BTreeMap<String, WorkflowRow>,
    history: BTreeMap<String, Vec<StepResultRow>>,
}

/// In-memory implementation of [`WorkflowStore`].
///
/// Definitions and history sit behind a single lock so deletes are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowRow>, StoreError> {
        Ok(self.tables.read().await.workflows.get(id).cloned())
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, StoreError> {
        Ok(self.tables.read().await.workflows.values().cloned().collect())
    }

    async fn put_workflow(&self, row: WorkflowRow) -> Result<(), StoreError> {
        debug!(workflow_id = %row.id, "storing workflow");
        self.tables.write().await.workflows.insert(row.id.clone(), row);
        Ok(())
    }

    async fn delete_workflow(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let removed = tables.workflows.remove(id).is_some();
        let had_history = tables.history.remove(id).is_some();
        Ok(removed || had_history)
    }

    async fn append_history(
        &self,
        workflow_id: &str,
        results: &[StepResultRow],
    ) -> Result<(), StoreError> {
        if results.is_empty() {
            return Ok(());
        }
        self.tables
            .write()
            .await
            .history
            .entry(workflow_id.to_owned())
            .or_default()
            .extend_from_slice(results);
        Ok(())
    }

    async fn history(&self, workflow_id: &str) -> Result<Vec<StepResultRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .history
            .get(workflow_id)
            .cloned()
            .unwrap_or_default())
    }
}
