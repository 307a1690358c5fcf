//! Inbox Assist: drives hosted assistants over Gmail, Slack and Trello.

pub mod agent;
pub mod assistant;
pub mod channels;
pub mod config;
pub mod error;
pub mod jobs;
pub mod prompts;
pub mod server;
pub mod setup;
pub mod store;
pub mod tools;
