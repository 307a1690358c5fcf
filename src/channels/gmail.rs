//! Gmail REST client with refresh-token OAuth.

use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::{Mutex, OnceCell};

use crate::channels::gmail_types::{
    AttachmentData, Draft, GmailMessage, Label, LabelList, MessageList, decode_base64url,
};
use crate::config::GmailConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "gmail";

/// Tokens are refreshed this long before Google says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

pub struct GmailClient {
    http: reqwest::Client,
    config: GmailConfig,
    token: Mutex<Option<CachedToken>>,
    labels: OnceCell<Vec<Label>>,
}

impl GmailClient {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token: Mutex::new(None),
            labels: OnceCell::new(),
        }
    }

    /// Exchange the refresh token for an access token, reusing a cached one
    /// while it is still valid.
    async fn access_token(&self) -> Result<SecretString, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.token.clone());
        }

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("refresh_token", self.config.refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::AuthFailed {
                provider: PROVIDER.into(),
                reason: format!("Failed to get access token: {status} - {body}"),
            });
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, e))?;

        let lifetime = Duration::from_secs(data.expires_in.unwrap_or(3600));
        let token = SecretString::from(data.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        tracing::debug!("Refreshed Gmail access token");
        Ok(token)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ProviderError> {
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.config.api_base))
            .bearer_auth(token.expose_secret()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        builder: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, format!("{action}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body: format!("Failed to {action}: {body}"),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, format!("{action}: {e}")))
    }

    // ── Messages ────────────────────────────────────────────────────

    pub async fn list_messages(
        &self,
        query: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<MessageList, ProviderError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(max) = max_results {
            params.push(("maxResults", max.to_string()));
        }
        if let Some(q) = query {
            params.push(("q", q.to_string()));
        }
        let req = self.request(Method::GET, "/messages").await?.query(&params);
        self.send("list messages", req).await
    }

    pub async fn get_message(&self, message_id: &str) -> Result<GmailMessage, ProviderError> {
        let req = self
            .request(Method::GET, &format!("/messages/{message_id}"))
            .await?
            .query(&[("format", "full")]);
        self.send("fetch message", req).await
    }

    /// Full RFC 822 source of a message.
    pub async fn get_raw_message(&self, message_id: &str) -> Result<Vec<u8>, ProviderError> {
        let req = self
            .request(Method::GET, &format!("/messages/{message_id}"))
            .await?
            .query(&[("format", "raw")]);
        let message: GmailMessage = self.send("fetch raw message", req).await?;
        message
            .raw
            .as_deref()
            .and_then(decode_base64url)
            .ok_or_else(|| ProviderError::invalid(PROVIDER, "raw message missing or not base64url"))
    }

    pub async fn modify_labels(
        &self,
        message_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<GmailMessage, ProviderError> {
        let req = self
            .request(Method::POST, &format!("/messages/{message_id}/modify"))
            .await?
            .json(&json!({ "addLabelIds": add, "removeLabelIds": remove }));
        self.send("modify labels", req).await
    }

    pub async fn create_draft(&self, thread_id: &str, raw: &str) -> Result<Draft, ProviderError> {
        let req = self
            .request(Method::POST, "/drafts")
            .await?
            .json(&json!({ "message": { "threadId": thread_id, "raw": raw } }));
        self.send("create draft", req).await
    }

    pub async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentData, ProviderError> {
        let req = self
            .request(
                Method::GET,
                &format!("/messages/{message_id}/attachments/{attachment_id}"),
            )
            .await?;
        self.send("fetch attachment", req).await
    }

    // ── Labels ──────────────────────────────────────────────────────

    /// The account's labels, fetched once per client.
    pub async fn labels(&self) -> Result<&[Label], ProviderError> {
        let labels = self
            .labels
            .get_or_try_init(|| async {
                let req = self.request(Method::GET, "/labels").await?;
                let list: LabelList = self.send("list labels", req).await?;
                tracing::debug!(count = list.labels.len(), "Cached Gmail labels");
                Ok::<_, ProviderError>(list.labels)
            })
            .await?;
        Ok(labels.as_slice())
    }
}
