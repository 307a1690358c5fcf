//! Tool registry and the name-based dispatcher built on it.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::assistant::ToolSpec;
use crate::tools::envelope::ResultEnvelope;
use crate::tools::tool::Tool;

/// Arguments as delivered by the caller: the model's raw JSON string, or an
/// already-parsed value from a direct HTTP call.
#[derive(Debug, Clone)]
pub enum ToolArguments {
    Raw(String),
    Value(Value),
}

impl ToolArguments {
    /// Empty strings and `null` mean "no arguments".
    fn into_value(self) -> Result<Value, serde_json::Error> {
        let value = match self {
            ToolArguments::Raw(raw) if raw.trim().is_empty() => Value::Null,
            ToolArguments::Raw(raw) => serde_json::from_str(&raw)?,
            ToolArguments::Value(value) => value,
        };
        Ok(match value {
            Value::Null => json!({}),
            other => other,
        })
    }
}

/// Routes a function call to exactly one operation. Never fails: every
/// outcome is an envelope.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, name: &str, arguments: ToolArguments) -> ResultEnvelope;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool, replacing any tool of the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.write().await.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced existing tool registration");
        }
        tracing::debug!("Registered tool: {}", name);
    }

    /// Register during startup, before the registry is shared.
    pub fn register_sync(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Ok(mut tools) = self.tools.try_write() {
            tools.insert(name.clone(), tool);
            tracing::debug!("Registered tool: {}", name);
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// All tool names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.tools.try_read().map(|t| t.len()).unwrap_or(0)
    }

    /// Function specs for the named tools, in the given order. Unregistered
    /// names are skipped.
    pub async fn tool_specs_for(&self, names: &[&str]) -> Vec<ToolSpec> {
        let tools = self.tools.read().await;
        names
            .iter()
            .filter_map(|name| tools.get(*name))
            .map(|tool| {
                ToolSpec::function(tool.name(), tool.description(), tool.parameters_schema())
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for ToolRegistry {
    async fn dispatch(&self, name: &str, arguments: ToolArguments) -> ResultEnvelope {
        let Some(tool) = self.get(name).await else {
            tracing::warn!(tool = %name, "Unknown function requested");
            return ResultEnvelope::client_error(format!("Unknown function: {name}"));
        };

        let params = match arguments.into_value() {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Unparseable tool arguments");
                return ResultEnvelope::client_error(format!("Invalid arguments for {name}: {e}"));
            }
        };

        tracing::debug!(tool = %name, "Executing tool");
        // A panicking tool must not take the run loop or the HTTP task with it.
        let result = match AssertUnwindSafe(tool.execute(params)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(tool = %name, "Tool panicked");
                return ResultEnvelope::server_error(format!("{name} panicked"));
            }
        };
        if let Err(e) = &result {
            tracing::warn!(tool = %name, error = %e, "Tool call failed");
        }
        result.into()
    }
}
