//! The `Trigger` trait: the contract every workflow capability must fulfil.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{TriggerDescriptor, TriggerError};

/// Key under which upstream step results are handed to a trigger.
pub const VARIABLES_KEY: &str = "variables";

/// Variables threaded between the steps of one run.
pub type Variables = Map<String, Value>;

/// Per-invocation context passed to every trigger.
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
    /// Results of the steps that ran before this one, keyed `<step name>_result`.
    pub variables: Variables,
}

/// A typed trigger.
///
/// Implementors declare their parameter and output types; the registry
/// stores them behind [`ErasedTrigger`], which handles the JSON conversion.
#[async_trait]
pub trait Trigger: Send + Sync + 'static {
    type Params: DeserializeOwned + Send;
    type Output: Serialize + Send;

    /// Catalog entry for this trigger.
    fn descriptor(&self) -> TriggerDescriptor;

    async fn execute(
        &self,
        params: Self::Params,
        ctx: &TriggerContext,
    ) -> Result<Self::Output, TriggerError>;
}

/// Object-safe form of [`Trigger`] operating on raw JSON.
#[async_trait]
pub trait ErasedTrigger: Send + Sync {
    fn descriptor(&self) -> TriggerDescriptor;

    /// Run the trigger with the step's parameter object. Upstream variables
    /// travel inside it under [`VARIABLES_KEY`].
    async fn execute_json(&self, input: Value) -> Result<Value, TriggerError>;
}

#[async_trait]
impl<T: Trigger> ErasedTrigger for T {
    fn descriptor(&self) -> TriggerDescriptor {
        Trigger::descriptor(self)
    }

    async fn execute_json(&self, input: Value) -> Result<Value, TriggerError> {
        let (params, ctx) = split_input(&Trigger::descriptor(self), input)?;
        let params: T::Params = serde_json::from_value(Value::Object(params))
            .map_err(|e| TriggerError::InvalidParams(e.to_string()))?;

        let output = self.execute(params, &ctx).await?;

        serde_json::to_value(output)
            .map_err(|e| TriggerError::failed(format!("could not serialise trigger output: {e}")))
    }
}

/// Pull the variables out of the input object and fill in declared defaults.
fn split_input(
    descriptor: &TriggerDescriptor,
    input: Value,
) -> Result<(Map<String, Value>, TriggerContext), TriggerError> {
    let mut params = match input {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(TriggerError::InvalidParams(format!(
                "expected an object, got {other}"
            )))
        }
    };

    let variables = match params.remove(VARIABLES_KEY) {
        Some(Value::Object(vars)) => vars,
        _ => Map::new(),
    };

    for param in &descriptor.params {
        if let Some(default) = &param.default {
            let missing = match params.get(&param.id) {
                None | Some(Value::Null) => true,
                // Blank form fields count as absent.
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                params.insert(param.id.clone(), default.clone());
            }
        }
    }

    Ok((params, TriggerContext { variables }))
}
