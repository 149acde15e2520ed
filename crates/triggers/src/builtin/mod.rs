//! Built-in triggers: system commands, outbound HTTP requests and inline
//! scripts.

use std::time::Duration;

use crate::TriggerRegistry;

pub mod http;
pub mod script;
pub mod system;

pub use http::HttpRequestTrigger;
pub use script::RunScriptTrigger;
pub use system::SystemCommandTrigger;

/// Tuning knobs for the built-in triggers.
#[derive(Debug, Clone)]
pub struct BuiltinConfig {
    /// Upper bound on a single outbound HTTP request.
    pub http_timeout: Duration,
    /// Upper bound on a single script run.
    pub script_timeout: Duration,
}

impl Default for BuiltinConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(60),
        }
    }
}

pub(crate) fn register_all(registry: &mut TriggerRegistry, config: &BuiltinConfig) {
    registry.register(SystemCommandTrigger);
    registry.register(HttpRequestTrigger::new(config.http_timeout));
    registry.register(RunScriptTrigger::new(config.script_timeout));
}
