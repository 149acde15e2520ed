use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use engine::{validate_draft, ExecutionResult, Workflow, WorkflowDraft};

use super::AppState;
use crate::ApiError;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Workflow>>, ApiError> {
    Ok(Json(state.engine.list_workflows().await?))
}

pub async fn get(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Workflow>, ApiError> {
    match state.engine.get_workflow(&id).await? {
        Some(workflow) => Ok(Json(workflow)),
        None => Err(ApiError::NotFound("Workflow not found".into())),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<Json<Workflow>, ApiError> {
    let errors = validate_draft(&draft, state.engine.registry());
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    Ok(Json(state.engine.create_workflow(draft).await?))
}

pub async fn update(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<Json<Workflow>, ApiError> {
    let errors = validate_draft(&draft, state.engine.registry());
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    match state.engine.update_workflow(&id, draft).await? {
        Some(workflow) => Ok(Json(workflow)),
        None => Err(ApiError::NotFound("Workflow not found".into())),
    }
}

pub async fn delete(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.engine.delete_workflow(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Workflow not found".into()))
    }
}

pub async fn history(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExecutionResult>>, ApiError> {
    Ok(Json(state.engine.execution_history(&id).await?))
}
