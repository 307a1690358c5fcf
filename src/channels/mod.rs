//! Downstream provider clients: Gmail, Slack, Trello and SMTP forwarding.

pub mod bookkeeping;
pub mod gmail;
pub mod gmail_types;
pub mod slack;
pub mod trello;

pub use bookkeeping::BookkeepingMailer;
pub use gmail::GmailClient;
pub use slack::SlackClient;
pub use trello::TrelloClient;
