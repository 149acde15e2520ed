use axum::extract::State;
use axum::Json;
use triggers::TriggerDescriptor;

use super::AppState;

/// The trigger catalog, without the executable side.
pub async fn catalog(State(state): State<AppState>) -> Json<Vec<TriggerDescriptor>> {
    Json(state.engine.registry().catalog())
}
