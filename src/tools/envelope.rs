//! The uniform `{statusCode, body}` result of a tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::tools::tool::ToolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub status_code: u16,
    pub body: Value,
}

impl ResultEnvelope {
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    pub fn client_error(message: impl Into<String>) -> Self {
        Self::error(400, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::error(500, message)
    }

    fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    /// The body as the string submitted back to the assistant.
    pub fn output(&self) -> String {
        self.body.to_string()
    }
}

impl From<Result<Value, ToolError>> for ResultEnvelope {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(body) => Self::ok(body),
            Err(e) if e.is_client_error() => Self::client_error(e.to_string()),
            Err(e) => Self::server_error(e.to_string()),
        }
    }
}
