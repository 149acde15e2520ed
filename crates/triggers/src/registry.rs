//! Registry of the triggers available to workflow steps.
//!
//! Populated once at start-up and shared read-only afterwards, so no
//! interior locking is needed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::builtin::{self, BuiltinConfig};
use crate::{ErasedTrigger, Trigger, TriggerDescriptor};

/// Maps trigger ids to their executable implementations.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    triggers: BTreeMap<String, Arc<dyn ErasedTrigger>>,
}

impl TriggerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in trigger.
    pub fn with_builtins(config: BuiltinConfig) -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry, &config);
        registry
    }

    /// Register a trigger under its descriptor id, replacing any previous
    /// trigger with the same id.
    pub fn register<T: Trigger>(&mut self, trigger: T) {
        self.register_arc(Arc::new(trigger));
    }

    pub fn register_arc(&mut self, trigger: Arc<dyn ErasedTrigger>) {
        let id = trigger.descriptor().id;
        debug!(trigger_id = %id, "registering trigger");
        self.triggers.insert(id, trigger);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ErasedTrigger>> {
        self.triggers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.triggers.contains_key(id)
    }

    /// Descriptors of every registered trigger, ordered by id.
    pub fn catalog(&self) -> Vec<TriggerDescriptor> {
        self.triggers.values().map(|t| t.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
