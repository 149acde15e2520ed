use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use engine::{validate_workflow, ExecutionContext, ExecutionResult, Workflow};
use triggers::Variables;

use super::AppState;
use crate::ApiError;

/// Either a stored workflow id or an inline definition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWorkflowDto {
    pub workflow_id: Option<String>,
    /// Initial variables for the run.
    #[serde(default)]
    pub params: Variables,
    pub workflow: Option<Workflow>,
}

pub async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> Result<Json<Vec<ExecutionResult>>, ApiError> {
    let results = match (payload.workflow, payload.workflow_id) {
        (Some(mut workflow), _) => {
            let errors = validate_workflow(&workflow, state.engine.registry());
            if !errors.is_empty() {
                return Err(ApiError::Validation(errors));
            }
            if workflow.id.is_empty() {
                workflow.id = Uuid::new_v4().to_string();
            }
            info!(workflow_id = %workflow.id, "executing inline workflow");
            state
                .engine
                .execute_definition(&workflow, payload.params)
                .await?
        }
        (None, Some(id)) => state.engine.execute_workflow(&id, payload.params).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either workflowId or workflow is required".into(),
            ))
        }
    };
    Ok(Json(results))
}

pub async fn cancel(Path(id): Path<String>, State(state): State<AppState>) -> Json<Value> {
    let cancelled = state.engine.cancel_execution(&id);
    Json(json!({ "cancelled": cancelled }))
}

pub async fn active(State(state): State<AppState>) -> Json<Vec<ExecutionContext>> {
    Json(state.engine.active_executions())
}
