//! Request handlers, one module per resource.

use std::sync::Arc;

use engine::WorkflowEngine;

pub mod catalog;
pub mod executions;
pub mod workflows;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}
