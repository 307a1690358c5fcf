//! Slack tools: posting messages and reading thread history.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::channels::slack::SlackClient;
use crate::tools::tool::{Tool, ToolError, optional_str, require_str};

// ── slack_send_message ──────────────────────────────────────────────

pub struct SlackSendMessageTool {
    client: Arc<SlackClient>,
}

impl SlackSendMessageTool {
    pub fn new(client: Arc<SlackClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SlackSendMessageTool {
    fn name(&self) -> &str {
        "slack_send_message"
    }

    fn description(&self) -> &str {
        "Sends a message to a Slack channel"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string", "description": "The Slack channel ID to send the message to."},
                "text": {"type": "string", "description": "The message text to send."},
                "threadTs": {"type": "string", "description": "Optional thread timestamp to reply in a thread."}
            },
            "required": ["channel", "text"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let text = require_str(&params, "text")?;
        // A configured report channel always wins over the model's choice.
        let channel = match self.client.report_channel() {
            Some(channel) => channel,
            None => require_str(&params, "channel")?,
        };
        let thread_ts = optional_str(&params, "threadTs");

        let posted = self.client.post_message(channel, text, thread_ts).await?;
        Ok(json!({
            "success": true,
            "ts": posted.ts,
            "channel": posted.channel,
        }))
    }
}

// ── slack_get_thread_history ────────────────────────────────────────

pub struct SlackGetThreadHistoryTool {
    client: Arc<SlackClient>,
}

impl SlackGetThreadHistoryTool {
    pub fn new(client: Arc<SlackClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SlackGetThreadHistoryTool {
    fn name(&self) -> &str {
        "slack_get_thread_history"
    }

    fn description(&self) -> &str {
        "Gets the message history of a Slack thread"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string", "description": "The Slack channel ID."},
                "threadTs": {"type": "string", "description": "The timestamp of the thread's parent message."}
            },
            "required": ["channel", "threadTs"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let channel = require_str(&params, "channel")?;
        let thread_ts = require_str(&params, "threadTs")?;
        let messages = self.client.thread_history(channel, thread_ts).await?;
        Ok(json!({
            "count": messages.len(),
            "messages": messages,
        }))
    }
}
