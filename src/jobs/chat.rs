//! Slack chat worker: answers messages and mentions in their Slack thread,
//! keeping one assistant thread per Slack thread.

use std::sync::Arc;

use serde::Deserialize;

use crate::agent::{AssistantRunner, ResponseFormat, RunRequest};
use crate::assistant::Role;
use crate::channels::slack::SlackClient;

const THINKING: &str = "Thinking...";
const APOLOGY: &str = "Sorry, I encountered an error while processing your message.";

/// The `event` object of a Slack `event_callback`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl SlackEvent {
    pub fn is_chat_message(&self) -> bool {
        matches!(self.kind.as_str(), "message" | "app_mention")
    }

    /// Timestamp replies are threaded under.
    pub fn reply_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    pub fn thread_key(&self) -> String {
        format!("slack-{}-{}", self.channel, self.reply_ts())
    }
}

/// What the worker did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDisposition {
    Ignored,
    Answered,
    /// The run ended without completing; the reason was posted.
    ReportedFailure,
    /// The run could not be carried out; an apology was posted.
    Errored,
}

pub struct ChatWorker {
    runner: AssistantRunner,
    slack: Arc<SlackClient>,
    assistant_id: String,
}

impl ChatWorker {
    pub fn new(runner: AssistantRunner, slack: Arc<SlackClient>, assistant_id: String) -> Self {
        Self {
            runner,
            slack,
            assistant_id,
        }
    }

    pub async fn handle(&self, event: &SlackEvent) -> ChatDisposition {
        if event.bot_id.is_some() {
            tracing::debug!("Ignoring bot message");
            return ChatDisposition::Ignored;
        }
        if !event.is_chat_message() {
            tracing::debug!(kind = %event.kind, "Ignoring Slack event");
            return ChatDisposition::Ignored;
        }

        let channel = event.channel.as_str();
        let reply_ts = event.reply_ts();
        tracing::info!(channel, thread_ts = reply_ts, user = ?event.user, "Chat message received");

        self.post(channel, THINKING, reply_ts).await;

        let request = RunRequest {
            assistant_id: self.assistant_id.clone(),
            thread_key: Some(event.thread_key()),
            context: self.earlier_messages(event).await,
            messages: vec![(Role::User, event.text.clone())],
            format: ResponseFormat::Text,
        };

        match self.runner.run(request).await {
            Ok(outcome) if outcome.is_completed() => {
                self.post(channel, outcome.content().unwrap_or_default(), reply_ts)
                    .await;
                ChatDisposition::Answered
            }
            Ok(outcome) => {
                tracing::error!(status = %outcome.status, reason = outcome.failure_reason(), "Chat run did not complete");
                let text = format!(
                    "I encountered a problem while processing your request: {}",
                    outcome.failure_reason()
                );
                self.post(channel, &text, reply_ts).await;
                ChatDisposition::ReportedFailure
            }
            Err(e) => {
                tracing::error!(error = %e, "Chat run failed");
                self.post(channel, APOLOGY, reply_ts).await;
                ChatDisposition::Errored
            }
        }
    }

    /// Messages of the Slack thread before this one. Empty outside threads.
    async fn earlier_messages(&self, event: &SlackEvent) -> Vec<(Role, String)> {
        let Some(thread_ts) = event.thread_ts.as_deref() else {
            return Vec::new();
        };
        match self.slack.thread_history(&event.channel, thread_ts).await {
            Ok(mut entries) => {
                // The last entry is the message being answered.
                entries.pop();
                tracing::debug!(count = entries.len(), "Loaded Slack thread history");
                entries.into_iter().map(|e| (e.role, e.content)).collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load Slack thread history");
                Vec::new()
            }
        }
    }

    async fn post(&self, channel: &str, text: &str, thread_ts: &str) {
        if let Err(e) = self.slack.post_message(channel, text, Some(thread_ts)).await {
            tracing::error!(channel, error = %e, "Failed to post Slack message");
        }
    }
}
