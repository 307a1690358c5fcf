//! Built-in tools for Gmail, Slack, Trello, bookkeeping forwards and prompt
//! edits, and the tool set each assistant is provisioned with.

pub mod gmail;
pub mod prompt;
pub mod slack;
pub mod trello;

use std::sync::Arc;

use crate::channels::bookkeeping::BookkeepingMailer;
use crate::channels::gmail::GmailClient;
use crate::channels::slack::SlackClient;
use crate::channels::trello::TrelloClient;
use crate::prompts::{AssistantKind, PromptStore};
use crate::tools::registry::ToolRegistry;

const HANDLE_INBOX_TOOLS: &[&str] = &[
    "gmail_inbox_retrieval",
    "gmail_label_email",
    "gmail_archive_email",
    "gmail_send_to_bookkeeper",
    "gmail_create_draft",
    "gmail_get_message",
    "gmail_get_attachment",
    "gmail_search_unsubscribe_link",
    "slack_send_message",
    "trello_create_card",
    "archive_old_emails",
];

const DAILY_REPORT_TOOLS: &[&str] = &[
    "gmail_inbox_retrieval",
    "gmail_get_message",
    "gmail_search_unsubscribe_link",
    "slack_send_message",
];

const CHAT_TOOLS: &[&str] = &[
    "gmail_inbox_retrieval",
    "gmail_label_email",
    "gmail_archive_email",
    "gmail_send_to_bookkeeper",
    "gmail_create_draft",
    "gmail_get_message",
    "gmail_get_attachment",
    "gmail_search_unsubscribe_link",
    "slack_send_message",
    "slack_get_thread_history",
    "trello_create_card",
    "update_system_prompt",
];

/// Tool names an assistant is provisioned with, in declaration order.
pub fn tools_for(kind: AssistantKind) -> &'static [&'static str] {
    match kind {
        AssistantKind::HandleInbox => HANDLE_INBOX_TOOLS,
        AssistantKind::DailyReport => DAILY_REPORT_TOOLS,
        AssistantKind::Chat => CHAT_TOOLS,
    }
}

/// Provider clients the built-in tools are bound to. Tools of an
/// unconfigured provider are not registered.
pub struct Providers {
    pub gmail: Option<Arc<GmailClient>>,
    pub slack: Option<Arc<SlackClient>>,
    pub trello: Option<Arc<TrelloClient>>,
    pub bookkeeping: Option<Arc<BookkeepingMailer>>,
    pub prompts: Arc<PromptStore>,
}

/// Register every available built-in tool. Runs before the registry is
/// shared.
pub fn register_builtin_tools(registry: &ToolRegistry, providers: &Providers) {
    if let Some(client) = &providers.gmail {
        registry.register_sync(Arc::new(gmail::GmailInboxRetrievalTool::new(client.clone())));
        registry.register_sync(Arc::new(gmail::GmailGetMessageTool::new(client.clone())));
        registry.register_sync(Arc::new(gmail::GmailLabelEmailTool::new(client.clone())));
        registry.register_sync(Arc::new(gmail::GmailArchiveEmailTool::new(client.clone())));
        registry.register_sync(Arc::new(gmail::GmailCreateDraftTool::new(client.clone())));
        registry.register_sync(Arc::new(gmail::GmailGetAttachmentTool::new(client.clone())));
        registry.register_sync(Arc::new(gmail::GmailSearchUnsubscribeLinkTool::new(
            client.clone(),
        )));
        registry.register_sync(Arc::new(gmail::GmailSendToBookkeeperTool::new(
            client.clone(),
            providers.bookkeeping.clone(),
        )));
        registry.register_sync(Arc::new(gmail::ArchiveOldEmailsTool::new(client.clone())));
    } else {
        tracing::warn!("Gmail not configured, gmail tools unavailable");
    }

    if let Some(client) = &providers.slack {
        registry.register_sync(Arc::new(slack::SlackSendMessageTool::new(client.clone())));
        registry.register_sync(Arc::new(slack::SlackGetThreadHistoryTool::new(client.clone())));
    } else {
        tracing::warn!("Slack not configured, slack tools unavailable");
    }

    if let Some(client) = &providers.trello {
        registry.register_sync(Arc::new(trello::TrelloCreateCardTool::new(client.clone())));
    } else {
        tracing::warn!("Trello not configured, trello tools unavailable");
    }

    registry.register_sync(Arc::new(prompt::UpdateSystemPromptTool::new(
        providers.prompts.clone(),
    )));

    tracing::info!(count = registry.count(), "Registered built-in tools");
}
