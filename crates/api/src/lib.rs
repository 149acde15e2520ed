//! `api` crate — HTTP REST API over the workflow engine.
//!
//! Exposes:
//!   GET    /triggers
//!   GET    /workflows
//!   POST   /workflows
//!   GET    /workflows/{id}
//!   PUT    /workflows/{id}
//!   DELETE /workflows/{id}
//!   GET    /workflows/{id}/history
//!   POST   /workflows/{id}/cancel
//!   POST   /workflows/execute
//!   GET    /executions/active

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod handlers;

pub use error::ApiError;
pub use handlers::AppState;

use handlers::{catalog, executions, workflows};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/triggers", get(catalog::catalog))
        .route("/workflows", get(workflows::list).post(workflows::create))
        .route("/workflows/execute", post(executions::execute))
        .route(
            "/workflows/{id}",
            get(workflows::get)
                .put(workflows::update)
                .delete(workflows::delete),
        )
        .route("/workflows/{id}/history", get(workflows::history))
        .route("/workflows/{id}/cancel", post(executions::cancel))
        .route("/executions/active", get(executions::active))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
