//! Run orchestration: start a run, poll it to a terminal status, answer tool
//! calls through the dispatcher and break tool-call loops.
//!
//! The loop is an explicit state machine. [`RunOrchestrator::advance`] takes
//! the latest observed run and decides the next [`Step`];
//! [`RunOrchestrator::run`] drives it, sleeping between polls.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;

use crate::agent::history::ToolCallHistory;
use crate::agent::thread::{LatestMessage, ThreadManager};
use crate::assistant::{AssistantApi, Role, Run, RunStatus, ToolCall, ToolOutput};
use crate::config::OrchestratorConfig;
use crate::error::{AssistantError, Result};
use crate::tools::{Dispatcher, ToolArguments};

/// Assistant message appended to the thread when a loop is broken.
pub const LOOP_EXPLANATION: &str = "I've detected a loop in my processing. Some operations are being \
attempted repeatedly without success. I'll stop trying these operations to prevent an infinite loop. \
Please check if the required Gmail labels exist or if there are issues with the Slack channel configuration.";

pub const CANCELLED_MESSAGE: &str = "Run was cancelled due to repetitive failed operations";

/// Final result of a run, merged with the latest assistant message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub latest: Option<LatestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Text of the latest assistant message, if any.
    pub fn content(&self) -> Option<&str> {
        self.latest.as_ref().map(|m| m.content.as_str())
    }

    /// Best human-readable reason for a run that did not complete.
    pub fn failure_reason(&self) -> &str {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("Unknown error")
    }
}

/// What to do after observing a run.
#[derive(Debug)]
pub enum Step {
    /// Still working; poll again after the interval.
    Wait(Run),
    /// Tool outputs were submitted; inspect the returned run right away.
    Next(Run),
    Done(RunOutcome),
}

enum Planned<'a> {
    Ready(ToolOutput),
    Dispatch(&'a ToolCall),
}

fn error_output(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}

pub struct RunOrchestrator {
    api: Arc<dyn AssistantApi>,
    dispatcher: Arc<dyn Dispatcher>,
    thread: ThreadManager,
    assistant_id: String,
    poll_interval: Duration,
    history: ToolCallHistory,
}

impl RunOrchestrator {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        dispatcher: Arc<dyn Dispatcher>,
        thread: ThreadManager,
        assistant_id: impl Into<String>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            api,
            dispatcher,
            thread,
            assistant_id: assistant_id.into(),
            poll_interval: config.poll_interval,
            history: ToolCallHistory::new(config.max_tool_call_attempts),
        }
    }

    pub fn thread(&self) -> &ThreadManager {
        &self.thread
    }

    pub fn history(&self) -> &ToolCallHistory {
        &self.history
    }

    /// Start a run and drive it to a terminal outcome.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let thread_id = self.thread.initialize().await?;
        tracing::info!(assistant_id = %self.assistant_id, thread_id = %thread_id, "Starting run");

        let mut run = self.api.create_run(&thread_id, &self.assistant_id).await?;
        loop {
            run = match self.advance(run).await? {
                Step::Wait(run) => {
                    tokio::time::sleep(self.poll_interval).await;
                    self.api.retrieve_run(&thread_id, &run.id).await?
                }
                Step::Next(run) => run,
                Step::Done(outcome) => {
                    tracing::info!(status = %outcome.status, thread_id = %thread_id, "Run finished");
                    return Ok(outcome);
                }
            };
        }
    }

    /// Single transition of the run state machine.
    pub async fn advance(&mut self, run: Run) -> Result<Step> {
        match run.status {
            status if status.is_pending() => Ok(Step::Wait(run)),
            RunStatus::RequiresAction if run.pending_tool_calls().is_empty() => {
                tracing::debug!(run_id = %run.id, "requires_action without tool calls, polling again");
                Ok(Step::Wait(run))
            }
            RunStatus::RequiresAction => self.handle_tool_calls(&run).await,
            RunStatus::Completed => {
                let latest = self.thread.latest_message().await?;
                Ok(Step::Done(RunOutcome {
                    status: RunStatus::Completed,
                    thread_id: self.thread_id(),
                    latest,
                    message: None,
                    error: None,
                }))
            }
            RunStatus::Cancelled => {
                tracing::info!(run_id = %run.id, "Run was cancelled");
                Ok(Step::Done(self.cancelled_outcome().await))
            }
            status => {
                let error = run.error_message().unwrap_or("Unknown error").to_string();
                tracing::error!(run_id = %run.id, status = %status, error = %error, "Run did not complete");
                Ok(Step::Done(RunOutcome {
                    status,
                    thread_id: self.thread_id(),
                    latest: None,
                    message: None,
                    error: Some(error),
                }))
            }
        }
    }

    /// Answer every pending call of one batch. Each call id gets exactly one
    /// output; calls past the attempt limit are skipped and break the loop.
    async fn handle_tool_calls(&mut self, run: &Run) -> Result<Step> {
        let thread_id = self.bound_thread("submit tool outputs")?;
        let calls = run.pending_tool_calls();
        tracing::info!(run_id = %run.id, count = calls.len(), "Processing tool calls");

        let mut loop_detected = false;
        let mut planned = Vec::with_capacity(calls.len());
        for call in calls {
            if !call.is_function() {
                planned.push(Planned::Ready(ToolOutput {
                    tool_call_id: call.id.clone(),
                    output: error_output(format!("Unsupported tool call type: {}", call.kind)),
                }));
                continue;
            }

            let function = &call.function;
            if self.history.record(&function.name, &function.arguments) {
                planned.push(Planned::Dispatch(call));
            } else {
                tracing::warn!(
                    tool = %function.name,
                    arguments = %function.arguments,
                    attempts = self.history.attempts(&function.name, &function.arguments),
                    "Loop detected, skipping tool call"
                );
                loop_detected = true;
                planned.push(Planned::Ready(ToolOutput {
                    tool_call_id: call.id.clone(),
                    output: error_output(self.history.exceeded_message()),
                }));
            }
        }

        let dispatcher = &self.dispatcher;
        let outputs: Vec<ToolOutput> = join_all(planned.into_iter().map(|plan| async move {
            match plan {
                Planned::Ready(output) => output,
                Planned::Dispatch(call) => {
                    let name = &call.function.name;
                    tracing::debug!(tool = %name, call_id = %call.id, "Executing tool");
                    let envelope = dispatcher
                        .dispatch(name, ToolArguments::Raw(call.function.arguments.clone()))
                        .await;
                    if let Some(error) = envelope.error_message() {
                        tracing::info!(tool = %name, status = envelope.status_code, error, "Tool call returned an error");
                    }
                    ToolOutput {
                        tool_call_id: call.id.clone(),
                        output: envelope.output(),
                    }
                }
            }
        }))
        .await;

        if loop_detected {
            self.break_loop(&thread_id, &run.id).await;
            return Ok(Step::Done(self.cancelled_outcome().await));
        }

        tracing::debug!(run_id = %run.id, count = outputs.len(), "Submitting tool outputs");
        let next = self
            .api
            .submit_tool_outputs(&thread_id, &run.id, &outputs)
            .await?;
        Ok(Step::Next(next))
    }

    /// Explain the loop on the thread and cancel the run. Neither failure
    /// stops the run from being reported as cancelled.
    async fn break_loop(&mut self, thread_id: &str, run_id: &str) {
        if let Err(e) = self.thread.add_message(LOOP_EXPLANATION, Role::Assistant).await {
            tracing::warn!(thread_id, error = %e, "Could not add loop explanation");
        }
        match self.api.cancel_run(thread_id, run_id).await {
            Ok(_) => tracing::info!(run_id, "Cancelled run after loop detection"),
            Err(e) => tracing::warn!(run_id, error = %e, "Failed to cancel run after loop detection"),
        }
    }

    async fn cancelled_outcome(&self) -> RunOutcome {
        let latest = match self.thread.latest_message().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read latest message of cancelled run");
                None
            }
        };
        RunOutcome {
            status: RunStatus::Cancelled,
            thread_id: self.thread_id(),
            latest,
            message: Some(CANCELLED_MESSAGE.to_string()),
            error: None,
        }
    }

    fn thread_id(&self) -> Option<String> {
        self.thread.thread_id().map(str::to_string)
    }

    fn bound_thread(&self, operation: &'static str) -> Result<String> {
        Ok(self
            .thread
            .thread_id()
            .ok_or(AssistantError::NoThread { operation })?
            .to_string())
    }
}
