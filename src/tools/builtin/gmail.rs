//! Gmail tools: retrieval, labelling, archiving, drafting, attachments,
//! unsubscribe discovery and bookkeeping forwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{join_all, try_join_all};
use serde_json::{Value, json};

use crate::channels::bookkeeping::{BookkeepingMailer, parse_raw_email};
use crate::channels::gmail::GmailClient;
use crate::channels::gmail_types::{
    build_label_query, build_reply_raw, find_unsubscribe_url, reply_address, reply_subject,
    resolve_label_ids, validate_label_change,
};
use crate::error::ProviderError;
use crate::tools::tool::{Tool, ToolError, require_id, require_str, string_list};

const DEFAULT_MAX_RESULTS: u64 = 10;
const DEFAULT_ARCHIVE_DAYS: u64 = 3;
const MAX_ARCHIVE_DAYS: u64 = 3650;

async fn resolve_labels(
    client: &GmailClient,
    add: &[String],
    remove: &[String],
) -> (Vec<String>, Vec<String>) {
    match client.labels().await {
        Ok(labels) => (
            resolve_label_ids(labels, add),
            resolve_label_ids(labels, remove),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Label list unavailable, using names verbatim");
            (add.to_vec(), remove.to_vec())
        }
    }
}

/// Resolve label names and apply the change. The resolved ids are checked
/// again, since a user label may be named after a system label.
async fn apply_labels(
    client: &GmailClient,
    message_id: &str,
    add: &[String],
    remove: &[String],
) -> Result<Value, ToolError> {
    let (add, remove) = resolve_labels(client, add, remove).await;
    validate_label_change(&add, &remove).map_err(ToolError::Rejected)?;

    let message = client.modify_labels(message_id, &add, &remove).await?;
    Ok(json!({
        "id": message.id,
        "threadId": message.thread_id,
        "labelIds": message.label_ids,
    }))
}

async fn archive(client: &GmailClient, message_id: &str) -> Result<Value, ToolError> {
    let message = client
        .modify_labels(message_id, &[], &["INBOX".to_string()])
        .await?;
    Ok(json!({
        "id": message.id,
        "threadId": message.thread_id,
        "labelIds": message.label_ids,
    }))
}

// ── gmail_inbox_retrieval ───────────────────────────────────────────

pub struct GmailInboxRetrievalTool {
    client: Arc<GmailClient>,
}

impl GmailInboxRetrievalTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailInboxRetrievalTool {
    fn name(&self) -> &str {
        "gmail_inbox_retrieval"
    }

    fn description(&self) -> &str {
        "Retrieves emails from Gmail inbox with specified filters"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "labelFilter": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Array of labels to filter by. Prefix with '!' to exclude labels. Example: ['INBOX', '!processed-by-hi']."
                },
                "maxResults": {
                    "type": "integer",
                    "description": "Maximum number of emails to retrieve (1-100).",
                    "minimum": 1,
                    "maximum": 100,
                    "default": DEFAULT_MAX_RESULTS
                },
                "includeContent": {
                    "type": "boolean",
                    "description": "Whether to include full message content or just metadata.",
                    "default": false
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let filters = string_list(&params, "labelFilter")?;
        let max_results = params
            .get("maxResults")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, 100) as u32;
        let include_content = params
            .get("includeContent")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let query = build_label_query(&filters);
        let list = self
            .client
            .list_messages(query.as_deref(), Some(max_results))
            .await?;
        tracing::debug!(query = ?query, found = list.messages.len(), "Listed inbox");

        if !include_content {
            let messages: Vec<Value> = list
                .messages
                .iter()
                .map(|m| json!({"id": m.id, "threadId": m.thread_id}))
                .collect();
            return Ok(json!({
                "messages": messages,
                "resultSizeEstimate": list.result_size_estimate,
            }));
        }

        let full = try_join_all(
            list.messages
                .iter()
                .map(|m| self.client.get_message(&m.id)),
        )
        .await?;
        let summaries: Vec<_> = full.iter().map(|m| m.summarize()).collect();
        Ok(json!({
            "messages": summaries,
            "resultSizeEstimate": list.result_size_estimate,
        }))
    }
}

// ── gmail_get_message ───────────────────────────────────────────────

pub struct GmailGetMessageTool {
    client: Arc<GmailClient>,
}

impl GmailGetMessageTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailGetMessageTool {
    fn name(&self) -> &str {
        "gmail_get_message"
    }

    fn description(&self) -> &str {
        "Gets the full content and metadata of an email"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email to retrieve."}
            },
            "required": ["messageId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        let message = self.client.get_message(message_id).await?;
        if let Some(subject) = message.header("subject") {
            tracing::info!(message_id, subject, "Processing email");
        }
        serde_json::to_value(message.summarize()).map_err(|e| ToolError::ExecutionFailed {
            name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

// ── gmail_label_email ───────────────────────────────────────────────

pub struct GmailLabelEmailTool {
    client: Arc<GmailClient>,
}

impl GmailLabelEmailTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailLabelEmailTool {
    fn name(&self) -> &str {
        "gmail_label_email"
    }

    fn description(&self) -> &str {
        "Adds or removes labels from a Gmail message"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email to modify."},
                "addLabelIds": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Labels to add to the email. Only use custom labels such as 'processed-by-hi', 'to-summarize', 'archive-in-3-days'. Gmail system labels like 'INBOX' or 'UNREAD' are rejected.",
                    "default": []
                },
                "removeLabelIds": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Labels to remove from the email. Only use 'INBOX' to archive emails.",
                    "default": []
                }
            },
            "required": ["messageId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        let add = string_list(&params, "addLabelIds")?;
        let remove = string_list(&params, "removeLabelIds")?;
        validate_label_change(&add, &remove).map_err(ToolError::Rejected)?;

        apply_labels(&self.client, message_id, &add, &remove).await
    }
}

// ── gmail_archive_email ─────────────────────────────────────────────

pub struct GmailArchiveEmailTool {
    client: Arc<GmailClient>,
}

impl GmailArchiveEmailTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailArchiveEmailTool {
    fn name(&self) -> &str {
        "gmail_archive_email"
    }

    fn description(&self) -> &str {
        "Archives an email by removing it from the inbox"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email to archive."}
            },
            "required": ["messageId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        archive(&self.client, message_id).await
    }
}

// ── gmail_create_draft ──────────────────────────────────────────────

pub struct GmailCreateDraftTool {
    client: Arc<GmailClient>,
}

impl GmailCreateDraftTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailCreateDraftTool {
    fn name(&self) -> &str {
        "gmail_create_draft"
    }

    fn description(&self) -> &str {
        "Creates a draft reply to an email"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email to reply to."},
                "content": {"type": "string", "description": "The content of the draft reply."}
            },
            "required": ["messageId", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        let content = require_str(&params, "content")?;

        let original = self.client.get_message(message_id).await?;
        let from = original.header("from").unwrap_or_default();
        let to = reply_address(from).ok_or_else(|| ToolError::ExecutionFailed {
            name: self.name().into(),
            reason: "Could not extract email address from the From header".into(),
        })?;
        let subject = reply_subject(original.header("subject").unwrap_or_default());
        let in_reply_to = original.header("message-id").unwrap_or(message_id);

        let raw = build_reply_raw(&to, &subject, in_reply_to, content);
        let draft = self.client.create_draft(&original.thread_id, &raw).await?;
        tracing::info!(draft_id = %draft.id, message_id, "Created reply draft");

        Ok(json!({
            "success": true,
            "draftId": draft.id,
            "message": "Draft created successfully",
        }))
    }
}

// ── gmail_get_attachment ────────────────────────────────────────────

pub struct GmailGetAttachmentTool {
    client: Arc<GmailClient>,
}

impl GmailGetAttachmentTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailGetAttachmentTool {
    fn name(&self) -> &str {
        "gmail_get_attachment"
    }

    fn description(&self) -> &str {
        "Gets an attachment from an email"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email containing the attachment."},
                "attachmentId": {"type": "string", "description": "The ID of the attachment to retrieve."}
            },
            "required": ["messageId", "attachmentId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        let attachment_id = require_id(&params, "attachmentId")?;
        let attachment = self
            .client
            .get_attachment(message_id, attachment_id)
            .await?;
        Ok(json!({
            "attachmentId": attachment_id,
            "size": attachment.size,
            "data": attachment.data,
        }))
    }
}

// ── gmail_search_unsubscribe_link ───────────────────────────────────

pub struct GmailSearchUnsubscribeLinkTool {
    client: Arc<GmailClient>,
}

impl GmailSearchUnsubscribeLinkTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GmailSearchUnsubscribeLinkTool {
    fn name(&self) -> &str {
        "gmail_search_unsubscribe_link"
    }

    fn description(&self) -> &str {
        "Searches an email for an unsubscribe link"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email to search for an unsubscribe link."}
            },
            "required": ["messageId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        let message = self.client.get_message(message_id).await?;
        let url = find_unsubscribe_url(&message);
        Ok(json!({
            "messageId": message_id,
            "found": url.is_some(),
            "unsubscribeUrl": url,
        }))
    }
}

// ── gmail_send_to_bookkeeper ────────────────────────────────────────

pub struct GmailSendToBookkeeperTool {
    client: Arc<GmailClient>,
    mailer: Option<Arc<BookkeepingMailer>>,
}

impl GmailSendToBookkeeperTool {
    pub fn new(client: Arc<GmailClient>, mailer: Option<Arc<BookkeepingMailer>>) -> Self {
        Self { client, mailer }
    }
}

#[async_trait]
impl Tool for GmailSendToBookkeeperTool {
    fn name(&self) -> &str {
        "gmail_send_to_bookkeeper"
    }

    fn description(&self) -> &str {
        "Sends an email with its attachments to the bookkeeping email address. \
         Adds the 'sent to bookkeeping' label when sent."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string", "description": "The ID of the email to send to bookkeeping."}
            },
            "required": ["messageId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let message_id = require_id(&params, "messageId")?;
        let mailer = self
            .mailer
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: "bookkeeping".into(),
            })?;

        let raw = self.client.get_raw_message(message_id).await?;
        let email = parse_raw_email(&raw)?;
        mailer.send(&email).await?;

        let label_applied = match mailer.sent_label() {
            Some(label) => {
                apply_labels(&self.client, message_id, &[label.to_string()], &[]).await?;
                true
            }
            None => false,
        };

        Ok(json!({
            "success": true,
            "messageId": message_id,
            "sentTo": mailer.recipient(),
            "attachmentCount": email.attachments.len(),
            "labelApplied": label_applied,
        }))
    }
}

// ── archive_old_emails ──────────────────────────────────────────────

pub struct ArchiveOldEmailsTool {
    client: Arc<GmailClient>,
}

impl ArchiveOldEmailsTool {
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ArchiveOldEmailsTool {
    fn name(&self) -> &str {
        "archive_old_emails"
    }

    fn description(&self) -> &str {
        "Archives emails labeled with archive-in-x-days that are older than x days"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days": {
                    "type": "integer",
                    "description": "Number of days. Will archive emails labeled 'archive-in-X-days' that are older than X days.",
                    "minimum": 1,
                    "maximum": MAX_ARCHIVE_DAYS,
                    "default": DEFAULT_ARCHIVE_DAYS
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let days = params
            .get("days")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_ARCHIVE_DAYS)
            .max(1);
        if days > MAX_ARCHIVE_DAYS {
            return Err(ToolError::InvalidParameters(format!(
                "'days' must be at most {MAX_ARCHIVE_DAYS}"
            )));
        }
        let cutoff = i64::try_from(days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| ToolError::InvalidParameters(format!("'days' out of range: {days}")))?;
        let query = format!("label:archive-in-{days}-days before:{}", cutoff.timestamp());

        let list = self.client.list_messages(Some(&query), None).await?;
        let outcomes = join_all(list.messages.iter().map(|m| async move {
            let success = match archive(&self.client, &m.id).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(message_id = %m.id, error = %e, "Archive failed");
                    false
                }
            };
            json!({"messageId": m.id, "success": success})
        }))
        .await;

        let archived = outcomes
            .iter()
            .filter(|r| r["success"].as_bool() == Some(true))
            .count();
        tracing::info!(archived, found = list.messages.len(), days, "Archived old emails");

        Ok(json!({
            "archivedCount": archived,
            "totalFound": list.messages.len(),
            "results": outcomes,
        }))
    }
}
