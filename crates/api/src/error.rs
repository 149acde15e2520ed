//! Mapping from engine errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// The workflow failed structural validation.
    #[error("Workflow validation failed")]
    Validation(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "message": message })),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": message, "errors": errors }),
            ),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "message": message })),
            Self::Engine(err) => {
                let status = match &err {
                    e if e.is_not_found() => StatusCode::NOT_FOUND,
                    e if e.is_conflict() => StatusCode::CONFLICT,
                    EngineError::CycleDetected(_) => StatusCode::BAD_REQUEST,
                    _ => {
                        error!(error = %err, "request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, json!({ "message": message }))
            }
        };
        (status, Json(body)).into_response()
    }
}
