//! `triggers` crate — the `Trigger` trait, the trigger registry and the
//! built-in trigger implementations.
//!
//! Every capability a workflow step can invoke implements [`Trigger`]. The
//! engine only ever sees the type-erased [`ErasedTrigger`] returned by
//! [`TriggerRegistry::get`].

pub mod builtin;
pub mod descriptor;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use builtin::BuiltinConfig;
pub use descriptor::{ParamDescriptor, ParamKind, TriggerDescriptor};
pub use error::TriggerError;
pub use registry::TriggerRegistry;
pub use traits::{ErasedTrigger, Trigger, TriggerContext, Variables, VARIABLES_KEY};
