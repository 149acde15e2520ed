//! `store` crate — persistence layer for workflow definitions and their
//! execution history.
//!
//! Provides the [`WorkflowStore`] interface, typed row structs and an
//! in-memory implementation. No business logic lives here.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use models::{StepResultRow, WorkflowRow};
pub use repository::WorkflowStore;
