//! Structural validation. Run this before persisting or executing a
//! workflow.
//!
//! Rules enforced:
//! 1. The workflow has a non-empty name and at least one step.
//! 2. `firstStepId` is set and names an existing step.
//! 3. Walking the chain from the first step, every step names a registered
//!    trigger and supplies that trigger's required parameters with values
//!    of the declared type. The walk stops at the first revisited step.
//! 4. Every step is reachable from the first step.
//!
//! Problems are collected as human-readable messages; an empty list means
//! the workflow is valid. Nothing is mutated.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use triggers::TriggerRegistry;

use crate::models::{Workflow, WorkflowDraft, WorkflowStep};

/// Validate a stored or inline workflow.
pub fn validate_workflow(workflow: &Workflow, registry: &TriggerRegistry) -> Vec<String> {
    validate_parts(
        &workflow.name,
        workflow.first_step_id.as_deref(),
        &workflow.steps,
        registry,
    )
}

/// Validate a workflow before it is created or replaced.
pub fn validate_draft(draft: &WorkflowDraft, registry: &TriggerRegistry) -> Vec<String> {
    validate_parts(
        &draft.name,
        draft.first_step_id.as_deref(),
        &draft.steps,
        registry,
    )
}

fn validate_parts(
    name: &str,
    first_step_id: Option<&str>,
    steps: &HashMap<String, WorkflowStep>,
    registry: &TriggerRegistry,
) -> Vec<String> {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push("Workflow name is required".to_owned());
    }
    if steps.is_empty() {
        errors.push("Workflow must contain at least one step".to_owned());
        return errors;
    }

    let first = match first_step_id.filter(|id| !id.is_empty()) {
        None => {
            errors.push("First step is required".to_owned());
            return errors;
        }
        Some(id) if !steps.contains_key(id) => {
            errors.push(format!("First step {id} does not exist"));
            return errors;
        }
        Some(id) => id,
    };

    // -----------------------------------------------------------------------
    // Walk the chain
    // -----------------------------------------------------------------------
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(first);

    while let Some(step_id) = current {
        if !visited.insert(step_id) {
            break;
        }
        let Some(step) = steps.get(step_id) else {
            break;
        };

        check_step(step, registry, &mut errors);

        current = match step.next_step_id.as_deref().filter(|id| !id.is_empty()) {
            Some(next) if !steps.contains_key(next) => {
                errors.push(format!("Step {}: next step {next} does not exist", step.name));
                None
            }
            next => next,
        };
    }

    // -----------------------------------------------------------------------
    // Unreachable steps
    // -----------------------------------------------------------------------
    let mut orphans: Vec<&WorkflowStep> = steps
        .iter()
        .filter(|(id, _)| !visited.contains(id.as_str()))
        .map(|(_, step)| step)
        .collect();
    orphans.sort_by(|a, b| a.id.cmp(&b.id));
    for step in orphans {
        errors.push(format!(
            "Step {} is not accessible from the first step",
            step.name
        ));
    }

    errors
}

fn check_step(step: &WorkflowStep, registry: &TriggerRegistry, errors: &mut Vec<String>) {
    if step.trigger_id.trim().is_empty() {
        errors.push(format!("Step {}: a trigger is required", step.name));
        return;
    }
    let Some(trigger) = registry.get(&step.trigger_id) else {
        errors.push(format!("Step {}: unknown trigger {}", step.name, step.trigger_id));
        return;
    };

    for param in trigger.descriptor().params {
        match step.params.get(&param.id) {
            None | Some(Value::Null) => {
                if param.required && param.default.is_none() {
                    errors.push(format!(
                        "Step {}: parameter {} is required",
                        step.name, param.name
                    ));
                }
            }
            // Blank form fields count as absent.
            Some(Value::String(s)) if s.is_empty() => {
                if param.required && param.default.is_none() {
                    errors.push(format!(
                        "Step {}: parameter {} is required",
                        step.name, param.name
                    ));
                }
            }
            Some(value) if !param.accepts(value) => {
                errors.push(format!(
                    "Step {}: parameter {} must be a valid {}",
                    step.name,
                    param.name,
                    kind_label(&param)
                ));
            }
            Some(_) => {}
        }
    }
}

fn kind_label(param: &triggers::ParamDescriptor) -> String {
    match (&param.kind, &param.options) {
        (triggers::ParamKind::Select, Some(options)) => {
            format!("option ({})", options.join(", "))
        }
        (kind, _) => format!("{kind:?}").to_lowercase(),
    }
}
