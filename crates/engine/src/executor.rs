//! Workflow execution engine.
//!
//! `WorkflowEngine` is the central orchestrator:
//! 1. Loads the workflow and claims its single-flight slot.
//! 2. Follows the `nextStepId` chain from the first step, invoking each
//!    step's trigger with its params plus the variables published so far.
//! 3. Publishes every successful result as `<step name>_result`.
//! 4. Stops at the first failed step (fail-fast) or when cancelled.
//! 5. Appends the run's results to the workflow's history and releases
//!    the slot, whatever the outcome.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use store::{StepResultRow, WorkflowRow, WorkflowStore};
use triggers::{TriggerError, TriggerRegistry, Variables, VARIABLES_KEY};

use crate::models::{
    ExecutionContext, ExecutionResult, ExecutionStatus, Workflow, WorkflowDraft, WorkflowStatus,
    WorkflowStep,
};
use crate::EngineError;

/// Error recorded against a run that was cancelled through
/// [`WorkflowEngine::cancel_execution`].
pub const CANCELLED_MESSAGE: &str = "Execution cancelled by user";

// ---------------------------------------------------------------------------
// Active-execution registry
// ---------------------------------------------------------------------------

struct ActiveExecution {
    /// Distinguishes this run from a later run of the same workflow.
    run_id: Uuid,
    context: ExecutionContext,
    cancel: CancellationToken,
}

type ActiveTable = HashMap<String, ActiveExecution>;
type ActiveMap = Arc<Mutex<ActiveTable>>;

fn lock(active: &Mutex<ActiveTable>) -> MutexGuard<'_, ActiveTable> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a workflow's single-flight slot for the lifetime of one run.
///
/// Dropping the guard releases the slot, so a panicking trigger or a
/// dropped future can never leave a workflow stuck in "running".
struct RunGuard {
    active: ActiveMap,
    workflow_id: String,
    run_id: Uuid,
    cancel: CancellationToken,
}

impl RunGuard {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply `f` to this run's live context, if it is still registered.
    fn update(&self, f: impl FnOnce(&mut ExecutionContext)) {
        let mut active = lock(&self.active);
        if let Some(entry) = active.get_mut(&self.workflow_id) {
            if entry.run_id == self.run_id {
                f(&mut entry.context);
            }
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.active);
        // A cancelled run has already been removed and the slot may belong
        // to a newer run by now.
        if active
            .get(&self.workflow_id)
            .is_some_and(|entry| entry.run_id == self.run_id)
        {
            active.remove(&self.workflow_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a run
// ---------------------------------------------------------------------------

struct RunOutcome {
    results: Vec<ExecutionResult>,
    /// Structural error that aborted the run; it rejects the call.
    fatal: Option<EngineError>,
}

impl RunOutcome {
    fn into_result(self) -> Result<Vec<ExecutionResult>, EngineError> {
        match self.fatal {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Owns workflow definitions (through a [`WorkflowStore`]), the trigger
/// registry and the set of in-flight runs.
///
/// Construct one engine per process and share it behind an `Arc`.
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    registry: Arc<TriggerRegistry>,
    active: ActiveMap,
}

impl WorkflowEngine {
    /// Create a new engine.
    pub fn new(store: Arc<dyn WorkflowStore>, registry: Arc<TriggerRegistry>) -> Self {
        Self {
            store,
            registry,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Persist a new workflow. A random id is assigned unless the draft
    /// carries one; status is always `active`.
    ///
    /// # Errors
    /// [`EngineError::AlreadyExists`] if the draft's id is already taken.
    /// Replacing a stored workflow goes through [`Self::update_workflow`].
    pub async fn create_workflow(&self, draft: WorkflowDraft) -> Result<Workflow, EngineError> {
        let now = Utc::now();
        let id = match draft.id.filter(|id| !id.is_empty()) {
            Some(id) => {
                if self.store.get_workflow(&id).await?.is_some() {
                    warn!(workflow_id = %id, "rejecting duplicate workflow id");
                    return Err(EngineError::AlreadyExists(id));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let workflow = Workflow {
            id,
            name: draft.name,
            description: draft.description,
            first_step_id: draft.first_step_id,
            steps: draft.steps,
            status: WorkflowStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.put_workflow(WorkflowRow::try_from(&workflow)?).await?;
        info!(workflow_id = %workflow.id, "workflow created");
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, EngineError> {
        self.store
            .get_workflow(id)
            .await?
            .map(Workflow::try_from)
            .transpose()
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, EngineError> {
        self.store
            .list_workflows()
            .await?
            .into_iter()
            .map(Workflow::try_from)
            .collect()
    }

    /// Replace a workflow wholesale. Returns `None` if `id` is unknown.
    pub async fn update_workflow(
        &self,
        id: &str,
        draft: WorkflowDraft,
    ) -> Result<Option<Workflow>, EngineError> {
        let Some(existing) = self.get_workflow(id).await? else {
            return Ok(None);
        };

        let workflow = Workflow {
            id: existing.id,
            name: draft.name,
            description: draft.description,
            first_step_id: draft.first_step_id,
            steps: draft.steps,
            status: draft.status.unwrap_or(existing.status),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        self.store.put_workflow(WorkflowRow::try_from(&workflow)?).await?;
        info!(workflow_id = %workflow.id, "workflow updated");
        Ok(Some(workflow))
    }

    /// Remove a workflow and its execution history.
    pub async fn delete_workflow(&self, id: &str) -> Result<bool, EngineError> {
        let deleted = self.store.delete_workflow(id).await?;
        if deleted {
            info!(workflow_id = %id, "workflow deleted");
        }
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run a stored workflow and return the results of this run.
    ///
    /// # Errors
    /// - [`EngineError::WorkflowNotFound`] if nothing is stored under `id`.
    /// - [`EngineError::AlreadyRunning`] if a run of `id` is in flight.
    /// - [`EngineError::StepNotFound`] / [`EngineError::CycleDetected`] if
    ///   the chain is broken; results gathered before that point are still
    ///   appended to the history.
    ///
    /// A failing trigger is *not* an error: it shows up as the last,
    /// unsuccessful entry of the returned list.
    #[instrument(skip(self, initial_variables), fields(workflow_id = %id))]
    pub async fn execute_workflow(
        &self,
        id: &str,
        initial_variables: Variables,
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        let workflow = self
            .get_workflow(id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(id.to_owned()))?;

        let guard = self.begin(&workflow.id, &initial_variables)?;
        let outcome = self.drive(&workflow, initial_variables, &guard).await;

        let rows: Vec<StepResultRow> = outcome.results.iter().map(StepResultRow::from).collect();
        let persisted = self.store.append_history(&workflow.id, &rows).await;
        drop(guard);

        persisted?;
        outcome.into_result()
    }

    /// Run an unsaved workflow definition.
    ///
    /// Subject to the same single-flight rule, keyed by the definition's
    /// id; nothing is written to the history.
    #[instrument(skip(self, workflow, initial_variables), fields(workflow_id = %workflow.id))]
    pub async fn execute_definition(
        &self,
        workflow: &Workflow,
        initial_variables: Variables,
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        let guard = self.begin(&workflow.id, &initial_variables)?;
        let outcome = self.drive(workflow, initial_variables, &guard).await;
        drop(guard);
        outcome.into_result()
    }

    /// Cancel the in-flight run of `workflow_id`.
    ///
    /// The slot is released immediately; the run itself stops before its
    /// next step and reports [`CANCELLED_MESSAGE`] as its last result.
    /// Returns `false` if nothing was running.
    pub fn cancel_execution(&self, workflow_id: &str) -> bool {
        let Some(mut entry) = lock(&self.active).remove(workflow_id) else {
            return false;
        };
        entry.context.status = ExecutionStatus::Failed;
        entry.context.error = Some(CANCELLED_MESSAGE.to_owned());
        entry.cancel.cancel();
        info!(workflow_id = %workflow_id, "execution cancelled");
        true
    }

    /// Accumulated results of every past run of `workflow_id`.
    pub async fn execution_history(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        Ok(self
            .store
            .history(workflow_id)
            .await?
            .into_iter()
            .map(ExecutionResult::from)
            .collect())
    }

    /// Snapshot of the runs currently in flight.
    pub fn active_executions(&self) -> Vec<ExecutionContext> {
        lock(&self.active)
            .values()
            .map(|entry| entry.context.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Claim the single-flight slot for `workflow_id`.
    fn begin(&self, workflow_id: &str, variables: &Variables) -> Result<RunGuard, EngineError> {
        let mut active = lock(&self.active);
        if active.contains_key(workflow_id) {
            warn!(workflow_id = %workflow_id, "rejecting concurrent run");
            return Err(EngineError::AlreadyRunning(workflow_id.to_owned()));
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        active.insert(
            workflow_id.to_owned(),
            ActiveExecution {
                run_id,
                context: ExecutionContext {
                    workflow_id: workflow_id.to_owned(),
                    start_time: Utc::now(),
                    variables: variables.clone(),
                    status: ExecutionStatus::Running,
                    current_step_id: None,
                    error: None,
                },
                cancel: cancel.clone(),
            },
        );

        Ok(RunGuard {
            active: Arc::clone(&self.active),
            workflow_id: workflow_id.to_owned(),
            run_id,
            cancel,
        })
    }

    /// Walk the step chain. Never returns early with `Err`: whatever ran is
    /// always handed back so it can be recorded.
    async fn drive(
        &self,
        workflow: &Workflow,
        mut variables: Variables,
        guard: &RunGuard,
    ) -> RunOutcome {
        let mut results: Vec<ExecutionResult> = Vec::new();
        let mut fatal = None;
        let mut status = ExecutionStatus::Running;

        if workflow.steps.is_empty() {
            guard.update(|ctx| ctx.status = ExecutionStatus::Completed);
            return RunOutcome { results, fatal };
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut last_step: Option<String> = None;
        let mut current = workflow.first_step_id.clone();

        while let Some(step_id) = current.take() {
            if guard.is_cancelled() {
                results.push(ExecutionResult::failure(&step_id, CANCELLED_MESSAGE));
                status = ExecutionStatus::Failed;
                break;
            }
            if !visited.insert(step_id.clone()) {
                error!(step_id = %step_id, "step chain loops back on itself");
                fatal = Some(EngineError::CycleDetected(step_id));
                break;
            }
            let Some(step) = workflow.steps.get(&step_id) else {
                error!(step_id = %step_id, "step not found");
                fatal = Some(EngineError::StepNotFound(step_id));
                break;
            };

            guard.update(|ctx| ctx.current_step_id = Some(step_id.clone()));
            last_step = Some(step_id.clone());

            match self.invoke(step, &variables).await {
                Ok(output) => {
                    info!(step_id = %step.id, "step succeeded");
                    variables.insert(step.result_key(), output.clone());
                    results.push(ExecutionResult::success(&step.id, output));
                    guard.update(|ctx| ctx.variables = variables.clone());
                    current = step.next_step_id.clone();
                }
                Err(err) => {
                    warn!(step_id = %step.id, error = %err, "step failed");
                    results.push(ExecutionResult::failure(&step.id, err.to_string()));
                    status = ExecutionStatus::Failed;
                    break;
                }
            }
        }

        // Cancellation that landed while a step was in flight. The step's
        // own outcome stays in the list; the cancel entry always closes it.
        let cancel_recorded = results
            .last()
            .is_some_and(|r| r.error.as_deref() == Some(CANCELLED_MESSAGE));
        if fatal.is_none() && guard.is_cancelled() && !cancel_recorded {
            if let Some(step_id) = last_step {
                results.push(ExecutionResult::failure(step_id, CANCELLED_MESSAGE));
            }
            status = ExecutionStatus::Failed;
        }

        if fatal.is_some() {
            status = ExecutionStatus::Failed;
        } else if status == ExecutionStatus::Running {
            status = ExecutionStatus::Completed;
        }
        guard.update(|ctx| {
            ctx.status = status;
            ctx.current_step_id = None;
        });
        info!(
            steps = results.len(),
            status = ?status,
            "workflow run finished"
        );

        RunOutcome { results, fatal }
    }

    /// Call the step's trigger with its params and the upstream variables.
    async fn invoke(&self, step: &WorkflowStep, variables: &Variables) -> Result<Value, TriggerError> {
        let trigger = self.registry.get(&step.trigger_id).ok_or_else(|| {
            TriggerError::failed(format!("Trigger {} is not registered", step.trigger_id))
        })?;

        let mut input = step.params.clone();
        input.insert(VARIABLES_KEY.to_owned(), Value::Object(variables.clone()));
        trigger.execute_json(Value::Object(input)).await
    }
}
