//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory. They serialise to/from the camelCase JSON the HTTP layer
//! speaks and into the `definition` column of a [`WorkflowRow`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use store::{StepResultRow, WorkflowRow};
use triggers::Variables;

use crate::EngineError;

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// One node of a workflow's step chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Unique within the owning workflow.
    pub id: String,
    /// Also names the variable this step's result is published under.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Registry id of the trigger this step invokes.
    pub trigger_id: String,
    /// Author-supplied parameter values, keyed by parameter id.
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, trigger_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            trigger_id: trigger_id.into(),
            params: Map::new(),
            next_step_id: None,
        }
    }

    /// Set a parameter value.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Point this step at its successor.
    pub fn then(mut self, next_step_id: impl Into<String>) -> Self {
        self.next_step_id = Some(next_step_id.into());
        self
    }

    /// Variable key under which this step's result is published.
    pub fn result_key(&self) -> String {
        format!("{}_result", self.name)
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

/// A complete, stored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub first_step_id: Option<String>,
    /// Traversal follows `next_step_id` links, never map order.
    #[serde(default)]
    pub steps: HashMap<String, WorkflowStep>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor: links `steps` in the given order and starts
    /// the chain at the first one.
    pub fn chain(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        let first_step_id = steps.first().map(|s| s.id.clone());
        let next_ids: Vec<Option<String>> = steps
            .iter()
            .skip(1)
            .map(|s| Some(s.id.clone()))
            .chain(std::iter::once(None))
            .collect();

        let steps = steps
            .into_iter()
            .zip(next_ids)
            .map(|(mut step, next)| {
                step.next_step_id = next;
                (step.id.clone(), step)
            })
            .collect();

        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            first_step_id,
            steps,
            status: WorkflowStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<&Workflow> for WorkflowRow {
    type Error = EngineError;

    fn try_from(workflow: &Workflow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            definition: serde_json::to_value(workflow)?,
            updated_at: workflow.updated_at,
        })
    }
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = EngineError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(row.definition)?)
    }
}

// ---------------------------------------------------------------------------
// WorkflowDraft
// ---------------------------------------------------------------------------

/// Author-supplied fields for creating or replacing a workflow.
///
/// Ids, timestamps and (on create) status are stamped by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub first_step_id: Option<String>,
    #[serde(default)]
    pub steps: HashMap<String, WorkflowStep>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
}

impl From<Workflow> for WorkflowDraft {
    fn from(w: Workflow) -> Self {
        Self {
            id: Some(w.id),
            name: w.name,
            description: w.description,
            first_step_id: w.first_step_id,
            steps: w.steps,
            status: Some(w.status),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Immutable record of one step's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(step_id: impl Into<String>, result: Value) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

impl From<&ExecutionResult> for StepResultRow {
    fn from(r: &ExecutionResult) -> Self {
        Self {
            step_id: r.step_id.clone(),
            success: r.success,
            result: r.result.clone(),
            error: r.error.clone(),
            timestamp: r.timestamp,
        }
    }
}

impl From<StepResultRow> for ExecutionResult {
    fn from(row: StepResultRow) -> Self {
        Self {
            step_id: row.step_id,
            success: row.success,
            result: row.result,
            error: row.error,
            timestamp: row.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// Transient state of one in-progress run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub workflow_id: String,
    pub start_time: DateTime<Utc>,
    pub variables: Variables,
    pub status: ExecutionStatus,
    pub current_step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_links_steps_in_order() {
        let wf = Workflow::chain(
            "linear",
            vec![
                WorkflowStep::new("a", "A", "t"),
                WorkflowStep::new("b", "B", "t"),
                WorkflowStep::new("c", "C", "t"),
            ],
        );
        assert_eq!(wf.first_step_id.as_deref(), Some("a"));
        assert_eq!(wf.steps["a"].next_step_id.as_deref(), Some("b"));
        assert_eq!(wf.steps["b"].next_step_id.as_deref(), Some("c"));
        assert_eq!(wf.steps["c"].next_step_id, None);
    }

    #[test]
    fn workflow_round_trips_through_a_row() {
        let wf = Workflow::chain(
            "persisted",
            vec![WorkflowStep::new("a", "fetch", "http_request").param("url", json!("http://x"))],
        );
        let row = WorkflowRow::try_from(&wf).unwrap();
        assert_eq!(row.id, wf.id);
        assert_eq!(row.definition["firstStepId"], "a");
        assert_eq!(Workflow::try_from(row).unwrap(), wf);
    }

    #[test]
    fn inline_definitions_need_only_name_and_steps() {
        let wf: Workflow = serde_json::from_value(json!({
            "name": "adhoc",
            "firstStepId": "s1",
            "steps": { "s1": { "id": "s1", "name": "one", "triggerId": "t" } }
        }))
        .unwrap();
        assert!(wf.id.is_empty());
        assert_eq!(wf.status, WorkflowStatus::Active);
        assert!(wf.steps["s1"].params.is_empty());
    }

    #[test]
    fn failed_result_omits_result_field() {
        let v = serde_json::to_value(ExecutionResult::failure("s1", "boom")).unwrap();
        assert_eq!(v["stepId"], "s1");
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "boom");
        assert!(v.get("result").is_none());
    }
}
