//! `MockTrigger` — a test double for [`Trigger`].
//!
//! Useful in unit and integration tests where a real trigger would spawn
//! processes or hit the network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::{ParamDescriptor, Trigger, TriggerContext, TriggerDescriptor, TriggerError, Variables};

/// Behaviour injected into `MockTrigger` at construction time.
#[derive(Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with the given message.
    Fail(String),
    /// Return the upstream variable found at this JSON pointer
    /// (e.g. `/s1_result/y`), or `null` when absent.
    ReadVariable(String),
    /// Park until the `Notify` fires, then return the value.
    WaitThenReturn(Arc<Notify>, Value),
    /// Park until the `Notify` fires, then fail with the message.
    WaitThenFail(Arc<Notify>, String),
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub params: Value,
    pub variables: Variables,
}

/// A mock trigger that records every call it receives and returns a
/// programmer-specified result.
///
/// Clones share the call log, so a test can keep a handle after moving the
/// trigger into a registry.
#[derive(Clone)]
pub struct MockTrigger {
    /// Registry id of this trigger.
    pub id: String,
    pub behaviour: MockBehaviour,
    /// Parameters advertised in the descriptor.
    pub params: Vec<ParamDescriptor>,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockTrigger {
    pub fn new(id: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            id: id.into(),
            behaviour,
            params: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(id: impl Into<String>, value: Value) -> Self {
        Self::new(id, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always fails.
    pub fn failing(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(id, MockBehaviour::Fail(msg.into()))
    }

    /// Create a mock that echoes an upstream variable back.
    pub fn reading(id: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self::new(id, MockBehaviour::ReadVariable(pointer.into()))
    }

    /// Create a mock that blocks until `gate` is notified.
    pub fn gated(id: impl Into<String>, gate: Arc<Notify>, value: Value) -> Self {
        Self::new(id, MockBehaviour::WaitThenReturn(gate, value))
    }

    /// Create a mock that blocks until `gate` is notified and then fails.
    pub fn gated_failing(id: impl Into<String>, gate: Arc<Notify>, msg: impl Into<String>) -> Self {
        Self::new(id, MockBehaviour::WaitThenFail(gate, msg.into()))
    }

    /// Advertise parameters, e.g. to exercise validation.
    pub fn with_params(mut self, params: Vec<ParamDescriptor>) -> Self {
        self.params = params;
        self
    }

    /// Number of times this trigger has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of every call seen so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Trigger for MockTrigger {
    type Params = Value;
    type Output = Value;

    fn descriptor(&self) -> TriggerDescriptor {
        TriggerDescriptor {
            id: self.id.clone(),
            name: format!("Mock {}", self.id),
            description: "Test double".into(),
            language: "mock".into(),
            params: self.params.clone(),
        }
    }

    async fn execute(&self, params: Value, ctx: &TriggerContext) -> Result<Value, TriggerError> {
        self.calls.lock().unwrap().push(MockCall {
            params,
            variables: ctx.variables.clone(),
        });

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::Fail(msg) => Err(TriggerError::failed(msg.clone())),
            MockBehaviour::ReadVariable(pointer) => Ok(Value::Object(ctx.variables.clone())
                .pointer(pointer)
                .cloned()
                .unwrap_or(Value::Null)),
            MockBehaviour::WaitThenReturn(gate, v) => {
                gate.notified().await;
                Ok(v.clone())
            }
            MockBehaviour::WaitThenFail(gate, msg) => {
                gate.notified().await;
                Err(TriggerError::failed(msg.clone()))
            }
        }
    }
}
