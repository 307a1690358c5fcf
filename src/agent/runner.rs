//! Caller entry point: put an instruction on a thread and run an assistant on
//! it.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::agent::orchestrator::{RunOrchestrator, RunOutcome};
use crate::agent::thread::{ResponseFormat, ThreadManager};
use crate::assistant::{AssistantApi, Role};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::store::BlobStore;
use crate::tools::Dispatcher;

/// A run request: which assistant, which thread, and what to say.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub assistant_id: String,
    /// Persistence key. `None` runs on a fresh one-shot thread.
    pub thread_key: Option<String>,
    /// Earlier conversation, appended only when the thread is new.
    pub context: Vec<(Role, String)>,
    /// Messages appended before the run starts, oldest first.
    pub messages: Vec<(Role, String)>,
    pub format: ResponseFormat,
}

impl RunRequest {
    pub fn instruction(
        assistant_id: impl Into<String>,
        thread_key: Option<String>,
        instruction: impl Into<String>,
        format: ResponseFormat,
    ) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            thread_key,
            context: Vec::new(),
            messages: vec![(Role::User, instruction.into())],
            format,
        }
    }
}

/// Shared dependencies for running assistants. Cheap to clone.
#[derive(Clone)]
pub struct AssistantRunner {
    api: Arc<dyn AssistantApi>,
    store: Arc<dyn BlobStore>,
    dispatcher: Arc<dyn Dispatcher>,
    config: OrchestratorConfig,
}

impl AssistantRunner {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        store: Arc<dyn BlobStore>,
        dispatcher: Arc<dyn Dispatcher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            api,
            store,
            dispatcher,
            config,
        }
    }

    /// Append `instruction` as a user message and run the assistant.
    pub async fn run_instruction(
        &self,
        assistant_id: &str,
        thread_key: Option<&str>,
        instruction: &str,
        format: ResponseFormat,
    ) -> Result<RunOutcome> {
        self.run(RunRequest::instruction(
            assistant_id,
            thread_key.map(str::to_string),
            instruction,
            format,
        ))
        .await
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let span = tracing::info_span!(
            "assistant_run",
            invocation = %Uuid::new_v4(),
            assistant_id = %request.assistant_id,
        );
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: RunRequest) -> Result<RunOutcome> {
        let mut thread = ThreadManager::new(
            self.api.clone(),
            self.store.clone(),
            request.thread_key,
            request.format,
        );
        thread.initialize().await?;
        if thread.is_resumed() {
            tracing::debug!(skipped = request.context.len(), "Thread resumed, not replaying context");
        } else {
            for (role, content) in &request.context {
                thread.add_message(content, *role).await?;
            }
        }
        for (role, content) in &request.messages {
            thread.add_message(content, *role).await?;
        }

        let mut orchestrator = RunOrchestrator::new(
            self.api.clone(),
            self.dispatcher.clone(),
            thread,
            request.assistant_id,
            &self.config,
        );
        let outcome = orchestrator.run().await?;
        orchestrator.thread().touch().await;
        Ok(outcome)
    }
}
