//! Lets the chat assistant edit the system prompts of all assistants.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::prompts::{AssistantKind, PromptStore, PromptUpdate};
use crate::tools::tool::{Tool, ToolError, require_str};

pub struct UpdateSystemPromptTool {
    store: Arc<PromptStore>,
}

impl UpdateSystemPromptTool {
    pub fn new(store: Arc<PromptStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateSystemPromptTool {
    fn name(&self) -> &str {
        "update_system_prompt"
    }

    fn description(&self) -> &str {
        "Updates the system prompt for a specific assistant"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "assistant": {
                    "type": "string",
                    "enum": ["hi", "handle-inbox", "dare", "daily-report", "chat"],
                    "description": "The assistant whose system prompt should be updated."
                },
                "promptUpdate": {
                    "type": "object",
                    "properties": {
                        "mode": {
                            "type": "string",
                            "enum": ["append", "replace", "full"],
                            "description": "append adds to the end, replace swaps the search text, full replaces the whole prompt."
                        },
                        "search": {
                            "type": "string",
                            "description": "Text to replace. Required for replace mode."
                        },
                        "content": {
                            "type": "string",
                            "description": "The new prompt text."
                        }
                    },
                    "required": ["mode", "content"]
                }
            },
            "required": ["assistant", "promptUpdate"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let alias = require_str(&params, "assistant")?;
        let kind = AssistantKind::from_alias(alias)
            .ok_or_else(|| ToolError::InvalidParameters(format!("unknown assistant '{alias}'")))?;
        let update: PromptUpdate = params
            .get("promptUpdate")
            .cloned()
            .ok_or_else(|| ToolError::InvalidParameters("missing 'promptUpdate' parameter".into()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| ToolError::InvalidParameters(format!("promptUpdate: {e}")))
            })?;

        self.store
            .update(kind, &update)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: self.name().into(),
                reason: format!("{}: {e}", self.store.path(kind).display()),
            })?;

        Ok(json!({
            "success": true,
            "assistant": alias,
            "message": "System prompt updated successfully",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptConfig;

    async fn setup(initial: &str) -> (tempfile::TempDir, Arc<PromptStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PromptStore::new(&PromptConfig {
            dir: dir.path().to_path_buf(),
        }));
        tokio::fs::write(store.path(AssistantKind::DailyReport), initial)
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn replaces_text_in_prompt() {
        let (_dir, store) = setup("Report at 7pm.").await;
        let tool = UpdateSystemPromptTool::new(store.clone());

        let out = tool
            .execute(json!({
                "assistant": "dare",
                "promptUpdate": {"mode": "replace", "search": "7pm", "content": "8pm"}
            }))
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["assistant"], "dare");
        assert_eq!(
            store.read(AssistantKind::DailyReport).await.unwrap(),
            "Report at 8pm."
        );
    }

    #[tokio::test]
    async fn unknown_assistant_is_invalid() {
        let (_dir, store) = setup("x").await;
        let tool = UpdateSystemPromptTool::new(store);
        let err = tool
            .execute(json!({
                "assistant": "bookkeeper",
                "promptUpdate": {"mode": "full", "content": "y"}
            }))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn missing_content_is_invalid() {
        let (_dir, store) = setup("x").await;
        let tool = UpdateSystemPromptTool::new(store);
        let err = tool
            .execute(json!({"assistant": "chat", "promptUpdate": {"mode": "append"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn missing_prompt_file_is_execution_failure() {
        let (_dir, store) = setup("x").await;
        let tool = UpdateSystemPromptTool::new(store);
        let err = tool
            .execute(json!({"assistant": "chat", "promptUpdate": {"mode": "full", "content": "y"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
