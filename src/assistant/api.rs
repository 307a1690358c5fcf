//! Traits at the assistant-service seam.

use async_trait::async_trait;

use crate::assistant::types::{
    Assistant, AssistantDefinition, Role, Run, Thread, ThreadMessage, ToolOutput,
};
use crate::error::AssistantError;

/// Thread, message and run operations used by the orchestration core.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Create an empty thread.
    async fn create_thread(&self) -> Result<Thread, AssistantError>;

    /// Append a message to a thread.
    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AssistantError>;

    /// List a thread's messages, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError>;

    /// Start a run of `assistant_id` against the thread.
    async fn create_run(&self, thread_id: &str, assistant_id: &str)
    -> Result<Run, AssistantError>;

    /// Fetch the current state of a run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    /// Submit the outputs for every pending tool call of a run in one request.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError>;

    /// Ask the service to cancel a run.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;
}

/// Assistant provisioning, used only by setup.
#[async_trait]
pub trait AssistantAdmin: Send + Sync {
    async fn create_assistant(
        &self,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, AssistantError>;

    async fn update_assistant(
        &self,
        assistant_id: &str,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, AssistantError>;
}
