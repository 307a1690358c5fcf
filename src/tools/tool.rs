//! The `Tool` trait and shared parameter helpers.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

/// Errors a tool can return. The dispatcher turns every variant into an
/// envelope; none of them escape to the run loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Refused by a validation rule before any side effect.
    #[error("{0}")]
    Rejected(String),

    #[error("{name} failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ToolError {
    /// Whether the caller, not the tool, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidParameters(_) | Self::Rejected(_))
    }
}

/// A function the assistant can call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the parameter object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> Result<Value, ToolError>;
}

// ── Parameter helpers ───────────────────────────────────────────────

pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{key}' parameter")))
}

/// A string parameter that is spliced into a URL path. Gmail message and
/// attachment ids are URL-safe base64, so anything else is refused.
pub fn require_id<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    let id = require_str(params, key)?;
    let valid = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid {
        return Err(ToolError::InvalidParameters(format!("'{key}' is not a valid id")));
    }
    Ok(id)
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// A string array parameter. Missing or `null` is empty.
pub fn string_list(params: &Value, key: &str) -> Result<Vec<String>, ToolError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ToolError::InvalidParameters(format!("'{key}' must contain only strings"))
                })
            })
            .collect(),
        Some(_) => Err(ToolError::InvalidParameters(format!(
            "'{key}' must be an array of strings"
        ))),
    }
}
