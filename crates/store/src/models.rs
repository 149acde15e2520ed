//! Row structs that the store persists.
//!
//! These are *persistence* models; they carry no domain behaviour.
//! Domain types live in the `engine` crate, which serialises its
//! workflows into the `definition` column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRow {
    pub id: String,
    pub name: String,
    /// Full JSON workflow definition (steps, status, timestamps, ...)
    pub definition: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// execution history
// ---------------------------------------------------------------------------

/// Outcome of one step, appended to the owning workflow's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResultRow {
    pub step_id: String,
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}
