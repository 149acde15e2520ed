//! `run_script` — execute an inline script.
//!
//! Upstream variables are exposed to the script as JSON in the
//! `WORKFLOW_VARIABLES` environment variable. Whatever the script prints to
//! stdout becomes the step result (parsed as JSON when possible).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::{ParamDescriptor, Trigger, TriggerContext, TriggerDescriptor, TriggerError};

pub const VARIABLES_ENV: &str = "WORKFLOW_VARIABLES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Python,
    Node,
    Bash,
}

impl ScriptLanguage {
    fn interpreter(self) -> (&'static str, &'static str) {
        match self {
            Self::Python => ("python3", "-c"),
            Self::Node => ("node", "-e"),
            Self::Bash => ("bash", "-c"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunScriptParams {
    pub language: ScriptLanguage,
    pub code: String,
}

pub struct RunScriptTrigger {
    timeout: Duration,
}

impl RunScriptTrigger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Trigger for RunScriptTrigger {
    type Params = RunScriptParams;
    type Output = Value;

    fn descriptor(&self) -> TriggerDescriptor {
        TriggerDescriptor {
            id: "run_script".into(),
            name: "Run script".into(),
            description: "Executes an inline script and returns what it prints".into(),
            language: "script".into(),
            params: vec![
                ParamDescriptor::select("language", "Language", &["python", "node", "bash"])
                    .required()
                    .with_default(json!("python")),
                ParamDescriptor::string("code", "Code").required(),
            ],
        }
    }

    async fn execute(
        &self,
        params: RunScriptParams,
        ctx: &TriggerContext,
    ) -> Result<Value, TriggerError> {
        let (program, flag) = params.language.interpreter();
        let variables = serde_json::to_string(&ctx.variables)
            .map_err(|e| TriggerError::failed(format!("could not encode variables: {e}")))?;
        debug!(language = ?params.language, "running script");

        let mut cmd = Command::new(program);
        cmd.arg(flag)
            .arg(&params.code)
            .env(VARIABLES_ENV, variables)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                TriggerError::failed(format!("script timed out after {:?}", self.timeout))
            })??;

        if !output.status.success() {
            return Err(TriggerError::failed(format!(
                "script exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        Ok(serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_owned())))
    }
}
