//! Conversation thread manager: binds an optional persistence key to a remote
//! thread, appends messages and reads back the latest assistant reply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assistant::{AssistantApi, Role, ThreadMessage};
use crate::error::{AssistantError, Result, StoreError};
use crate::store::BlobStore;

/// How the latest assistant message is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Stored mapping from a key to its thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRecord {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// The newest assistant message of a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestMessage {
    pub content: String,
    /// Present only in JSON mode. `null` when the content did not parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_content: Option<Option<Value>>,
    pub id: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl LatestMessage {
    fn from_message(message: &ThreadMessage, format: ResponseFormat) -> Self {
        let content = message.text();
        let (json_content, parse_error) = match format {
            ResponseFormat::Text => (None, None),
            ResponseFormat::Json => match serde_json::from_str::<Value>(&content) {
                Ok(value) => (Some(Some(value)), None),
                Err(e) => {
                    tracing::warn!(message_id = %message.id, error = %e, "Assistant reply is not valid JSON");
                    (Some(None), Some(e.to_string()))
                }
            },
        };
        Self {
            content,
            json_content,
            id: message.id.clone(),
            created_at: message.created_at,
            parse_error,
        }
    }

    /// Parsed JSON content, if the reply was structured and valid.
    pub fn json(&self) -> Option<&Value> {
        self.json_content.as_ref().and_then(Option::as_ref)
    }
}

pub fn store_key(key: &str) -> String {
    format!("thread-{key}")
}

pub struct ThreadManager {
    api: Arc<dyn AssistantApi>,
    store: Arc<dyn BlobStore>,
    key: Option<String>,
    format: ResponseFormat,
    thread_id: Option<String>,
    resumed: bool,
}

impl ThreadManager {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        store: Arc<dyn BlobStore>,
        key: Option<String>,
        format: ResponseFormat,
    ) -> Self {
        Self {
            api,
            store,
            key,
            format,
            thread_id: None,
            resumed: false,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Whether the bound thread was loaded from the store rather than created.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Bind a thread and return its id. Idempotent once bound.
    ///
    /// A keyed manager resumes the stored thread; an unreadable record counts
    /// as missing. Without a key a fresh thread is created and never stored.
    pub async fn initialize(&mut self) -> Result<String> {
        if let Some(id) = &self.thread_id {
            return Ok(id.clone());
        }

        if let Some(key) = &self.key
            && let Some(record) = self.load_record(key).await
        {
            tracing::info!(thread_id = %record.thread_id, key = %key, "Resumed thread");
            self.thread_id = Some(record.thread_id.clone());
            self.resumed = true;
            return Ok(record.thread_id);
        }

        let thread = self.api.create_thread().await?;
        tracing::info!(thread_id = %thread.id, "Created thread");

        if let Some(key) = &self.key {
            let now = Utc::now();
            let record = ThreadRecord {
                thread_id: thread.id.clone(),
                created_at: now,
                last_updated: now,
            };
            self.save_record(key, &record).await?;
            tracing::debug!(key = %key, "Stored thread mapping");
        }

        self.thread_id = Some(thread.id.clone());
        Ok(thread.id)
    }

    /// Append a message, binding a thread first if needed.
    pub async fn add_message(&mut self, content: &str, role: Role) -> Result<ThreadMessage> {
        let thread_id = self.initialize().await?;
        let message = self.api.create_message(&thread_id, role, content).await?;
        tracing::debug!(thread_id = %thread_id, role = %role, "Added message");
        Ok(message)
    }

    /// The newest assistant message, or `None` if the assistant has not
    /// written one yet.
    pub async fn latest_message(&self) -> Result<Option<LatestMessage>> {
        let thread_id = self.thread_id.as_deref().ok_or(AssistantError::NoThread {
            operation: "latest message",
        })?;
        let messages = self.api.list_messages(thread_id).await?;
        Ok(messages
            .iter()
            .find(|m| m.role == Role::Assistant)
            .map(|m| LatestMessage::from_message(m, self.format)))
    }

    /// Refresh `lastUpdated` of the stored record. Failures are logged only.
    pub async fn touch(&self) {
        let (Some(key), Some(thread_id)) = (&self.key, &self.thread_id) else {
            return;
        };
        let now = Utc::now();
        let record = match self.load_record(key).await {
            Some(record) if &record.thread_id == thread_id => ThreadRecord {
                last_updated: now,
                ..record
            },
            _ => ThreadRecord {
                thread_id: thread_id.clone(),
                created_at: now,
                last_updated: now,
            },
        };
        if let Err(e) = self.save_record(key, &record).await {
            tracing::warn!(key = %key, error = %e, "Failed to refresh thread record");
        }
    }

    async fn load_record(&self, key: &str) -> Option<ThreadRecord> {
        let raw = match self.store.get(&store_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Thread store lookup failed, creating a new thread");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unreadable thread record, creating a new thread");
                None
            }
        }
    }

    async fn save_record(&self, key: &str, record: &ThreadRecord) -> Result<()> {
        let raw = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(&store_key(key), &raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::FakeAssistant;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn manager(
        api: &Arc<FakeAssistant>,
        store: &Arc<MemoryStore>,
        key: Option<&str>,
        format: ResponseFormat,
    ) -> ThreadManager {
        ThreadManager::new(
            api.clone(),
            store.clone(),
            key.map(str::to_string),
            format,
        )
    }

    #[tokio::test]
    async fn keyed_initialize_creates_once_and_persists() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());

        let mut first = manager(&api, &store, Some("slack-C1-1.0"), ResponseFormat::Text);
        let id = first.initialize().await.unwrap();
        assert_eq!(first.initialize().await.unwrap(), id);

        assert!(!first.is_resumed());

        let mut second = manager(&api, &store, Some("slack-C1-1.0"), ResponseFormat::Text);
        assert_eq!(second.initialize().await.unwrap(), id);
        assert!(second.is_resumed());
        assert_eq!(api.threads_created(), 1);

        let raw = store.get("thread-slack-C1-1.0").await.unwrap().unwrap();
        let record: ThreadRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.thread_id, id);
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("lastUpdated").is_some());
    }

    #[tokio::test]
    async fn keyless_threads_are_fresh_and_unstored() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());

        let a = manager(&api, &store, None, ResponseFormat::Text)
            .initialize()
            .await
            .unwrap();
        let b = manager(&api, &store, None, ResponseFormat::Text)
            .initialize()
            .await
            .unwrap();
        assert_ne!(a, b);
        assert!(store.list("thread-").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_record_counts_as_missing() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        store.set("thread-k", "not json").await.unwrap();

        let mut mgr = manager(&api, &store, Some("k"), ResponseFormat::Text);
        let id = mgr.initialize().await.unwrap();
        assert_eq!(api.threads_created(), 1);

        let raw = store.get("thread-k").await.unwrap().unwrap();
        assert!(raw.contains(&id));
    }

    #[tokio::test]
    async fn add_message_binds_lazily() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mut mgr = manager(&api, &store, None, ResponseFormat::Text);

        mgr.add_message("hello", Role::User).await.unwrap();
        let thread_id = mgr.thread_id().unwrap().to_string();
        let messages = api.messages(&thread_id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "hello");
    }

    #[tokio::test]
    async fn latest_message_skips_user_messages() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mut mgr = manager(&api, &store, None, ResponseFormat::Text);

        mgr.add_message("first answer", Role::Assistant).await.unwrap();
        mgr.add_message("question", Role::User).await.unwrap();

        let latest = mgr.latest_message().await.unwrap().unwrap();
        assert_eq!(latest.content, "first answer");
        assert_eq!(latest.json_content, None);
        assert_eq!(latest.parse_error, None);
    }

    #[tokio::test]
    async fn latest_message_is_none_without_assistant_reply() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mut mgr = manager(&api, &store, None, ResponseFormat::Json);
        mgr.add_message("question", Role::User).await.unwrap();
        assert!(mgr.latest_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn structured_reply_parses() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mut mgr = manager(&api, &store, None, ResponseFormat::Json);
        mgr.add_message(r#"{"processed": 2, "labels": ["a"]}"#, Role::Assistant)
            .await
            .unwrap();

        let latest = mgr.latest_message().await.unwrap().unwrap();
        assert_eq!(latest.json(), Some(&json!({"processed": 2, "labels": ["a"]})));
        assert!(latest.parse_error.is_none());
    }

    #[tokio::test]
    async fn invalid_structured_reply_is_recovered() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mut mgr = manager(&api, &store, None, ResponseFormat::Json);
        mgr.add_message("Done! Nothing to report.", Role::Assistant)
            .await
            .unwrap();

        let latest = mgr.latest_message().await.unwrap().unwrap();
        assert_eq!(latest.content, "Done! Nothing to report.");
        assert_eq!(latest.json_content, Some(None));
        assert!(!latest.parse_error.as_deref().unwrap().is_empty());

        let wire = serde_json::to_value(&latest).unwrap();
        assert_eq!(wire["jsonContent"], Value::Null);
        assert!(wire["parseError"].is_string());
    }

    #[tokio::test]
    async fn latest_message_requires_thread() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(&api, &store, None, ResponseFormat::Text);
        assert!(mgr.latest_message().await.is_err());
    }

    #[tokio::test]
    async fn touch_keeps_created_at() {
        let api = Arc::new(FakeAssistant::new());
        let store = Arc::new(MemoryStore::new());
        let mut mgr = manager(&api, &store, Some("k"), ResponseFormat::Text);
        mgr.initialize().await.unwrap();
        let before: ThreadRecord =
            serde_json::from_str(&store.get("thread-k").await.unwrap().unwrap()).unwrap();

        mgr.touch().await;

        let after: ThreadRecord =
            serde_json::from_str(&store.get("thread-k").await.unwrap().unwrap()).unwrap();
        assert_eq!(after.created_at, before.created_at);
        assert!(after.last_updated >= before.last_updated);
    }
}
