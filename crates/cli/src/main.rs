//! `stoaviva-workflows` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `triggers` — print the trigger catalog.
//! - `validate` — validate a workflow JSON file.
//! - `run`      — validate and execute a workflow JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{validate_workflow, Workflow, WorkflowEngine};
use store::InMemoryStore;
use triggers::{BuiltinConfig, TriggerRegistry, Variables};

#[derive(Parser)]
#[command(
    name = "stoaviva-workflows",
    about = "Workflow builder and runner for the StoaViva storefront",
    version
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "STOAVIVA_LOG_JSON")]
    log_json: bool,

    #[command(flatten)]
    triggers: TriggerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct TriggerArgs {
    /// Timeout for `http_request` steps, in seconds.
    #[arg(long, global = true, env = "STOAVIVA_HTTP_TIMEOUT", default_value_t = 30)]
    http_timeout_secs: u64,

    /// Timeout for `run_script` steps, in seconds.
    #[arg(long, global = true, env = "STOAVIVA_SCRIPT_TIMEOUT", default_value_t = 60)]
    script_timeout_secs: u64,
}

impl TriggerArgs {
    fn registry(&self) -> TriggerRegistry {
        TriggerRegistry::with_builtins(BuiltinConfig {
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            script_timeout: Duration::from_secs(self.script_timeout_secs),
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "STOAVIVA_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Print the trigger catalog as JSON.
    Triggers,
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Run a workflow definition JSON file and print its results.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Initial variables as a JSON object.
        #[arg(long)]
        vars: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid workflow JSON")
}

fn report_invalid(errors: &[String]) {
    eprintln!("Validation failed:");
    for error in errors {
        eprintln!("  - {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let registry = Arc::new(cli.triggers.registry());

    match cli.command {
        Command::Serve { bind } => {
            info!("Starting API server on {bind}");
            let engine = WorkflowEngine::new(Arc::new(InMemoryStore::new()), registry);
            api::serve(&bind, api::AppState::new(Arc::new(engine))).await?;
        }
        Command::Triggers => {
            println!("{}", serde_json::to_string_pretty(&registry.catalog())?);
        }
        Command::Validate { path } => {
            let workflow = read_workflow(&path)?;
            let errors = validate_workflow(&workflow, &registry);
            if !errors.is_empty() {
                report_invalid(&errors);
                std::process::exit(1);
            }
            println!("Workflow '{}' is valid.", workflow.name);
        }
        Command::Run { path, vars } => {
            let mut workflow = read_workflow(&path)?;
            let errors = validate_workflow(&workflow, &registry);
            if !errors.is_empty() {
                report_invalid(&errors);
                std::process::exit(1);
            }
            let variables: Variables = match vars {
                Some(raw) => serde_json::from_str(&raw).context("--vars must be a JSON object")?,
                None => Variables::new(),
            };
            if workflow.id.is_empty() {
                workflow.id = path.display().to_string();
            }

            let engine = WorkflowEngine::new(Arc::new(InMemoryStore::new()), registry);
            let results = engine.execute_definition(&workflow, variables).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);

            if let Some(failed) = results.iter().find(|r| !r.success) {
                bail!(
                    "step {} failed: {}",
                    failed.step_id,
                    failed.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    Ok(())
}
