//! Assistant run orchestration: thread management, the tool-call loop and
//! loop detection.

pub mod history;
pub mod orchestrator;
pub mod runner;
pub mod thread;

#[cfg(test)]
pub(crate) mod testing;

pub use history::ToolCallHistory;
pub use orchestrator::{RunOrchestrator, RunOutcome, Step};
pub use runner::{AssistantRunner, RunRequest};
pub use thread::{LatestMessage, ResponseFormat, ThreadManager, ThreadRecord};
