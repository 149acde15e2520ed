//! `system_command` — run a program directly, without a shell.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::{ParamDescriptor, Trigger, TriggerContext, TriggerDescriptor, TriggerError};

pub struct SystemCommandTrigger;

#[derive(Debug, Deserialize)]
pub struct SystemCommandParams {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[async_trait]
impl Trigger for SystemCommandTrigger {
    type Params = SystemCommandParams;
    type Output = CommandOutput;

    fn descriptor(&self) -> TriggerDescriptor {
        TriggerDescriptor {
            id: "system_command".into(),
            name: "System command".into(),
            description: "Runs a program on the server and captures its output".into(),
            language: "shell".into(),
            params: vec![
                ParamDescriptor::string("command", "Command").required(),
                ParamDescriptor::array("args", "Arguments"),
                ParamDescriptor::string("cwd", "Working directory"),
            ],
        }
    }

    async fn execute(
        &self,
        params: SystemCommandParams,
        _ctx: &TriggerContext,
    ) -> Result<CommandOutput, TriggerError> {
        if params.command.trim().is_empty() {
            return Err(TriggerError::InvalidParams("command must not be empty".into()));
        }
        debug!(command = %params.command, args = ?params.args, "spawning command");

        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &params.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().await?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if !output.status.success() {
            return Err(TriggerError::failed(format!(
                "command exited with code {}: {}",
                result.exit_code,
                result.stderr.trim()
            )));
        }
        Ok(result)
    }
}
