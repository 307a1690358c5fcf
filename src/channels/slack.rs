//! Slack Web API client (`chat.postMessage`, `conversations.replies`).

use reqwest::RequestBuilder;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::assistant::Role;
use crate::config::SlackConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "slack";

/// Result of a successful `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedMessage {
    pub ts: String,
    pub channel: String,
}

/// A thread message mapped to an assistant-thread role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

pub struct SlackClient {
    http: reqwest::Client,
    config: SlackConfig,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Configured channel that overrides model-supplied channels, if any.
    pub fn report_channel(&self) -> Option<&str> {
        self.config.report_channel.as_deref()
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.config.api_base)
    }

    /// Send and unwrap Slack's `{ok, error}` envelope. `ok: false` is an error
    /// even on HTTP 200.
    async fn send(&self, method: &str, builder: RequestBuilder) -> Result<SlackEnvelope, ProviderError> {
        let resp = builder
            .bearer_auth(self.config.bot_token.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, format!("{method}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: SlackEnvelope = resp
            .json()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, format!("{method}: {e}")))?;
        if !envelope.ok {
            return Err(ProviderError::Rejected {
                provider: PROVIDER.into(),
                reason: envelope.error.unwrap_or_else(|| "unknown_error".into()),
            });
        }
        Ok(envelope)
    }

    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, ProviderError> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = json!(ts);
        }

        let req = self.http.post(self.url("chat.postMessage")).json(&body);
        let envelope = self.send("chat.postMessage", req).await?;
        tracing::debug!(channel, "Posted Slack message");

        Ok(PostedMessage {
            ts: envelope.ts.unwrap_or_default(),
            channel: envelope.channel.unwrap_or_else(|| channel.to_string()),
        })
    }

    /// All messages of a thread, oldest first. Bot messages map to `assistant`.
    pub async fn thread_history(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<ThreadEntry>, ProviderError> {
        let req = self
            .http
            .get(self.url("conversations.replies"))
            .query(&[("channel", channel), ("ts", thread_ts)]);
        let envelope = self.send("conversations.replies", req).await?;

        let bot_user = self.config.bot_user_id.as_deref();
        Ok(envelope
            .messages
            .into_iter()
            .map(|msg| {
                let is_bot = msg.bot_id.is_some()
                    || (bot_user.is_some() && msg.user.as_deref() == bot_user);
                ThreadEntry {
                    role: if is_bot { Role::Assistant } else { Role::User },
                    content: msg.text.unwrap_or_default(),
                }
            })
            .collect())
    }
}
