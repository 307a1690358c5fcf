//! In-memory assistant service for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::assistant::{
    AssistantApi, FunctionCall, MessageContent, RequiredAction, Role, Run, RunError, RunStatus,
    SubmitToolOutputs, TextContent, Thread, ThreadMessage, ToolCall, ToolOutput,
};
use crate::error::AssistantError;

pub(crate) fn run(status: RunStatus) -> Run {
    Run {
        id: "run_1".into(),
        thread_id: String::new(),
        status,
        required_action: None,
        last_error: None,
    }
}

/// A `requires_action` run asking for `(call_id, name, raw_args)` calls.
pub(crate) fn tool_call_run(calls: &[(&str, &str, &str)]) -> Run {
    let tool_calls = calls
        .iter()
        .map(|(id, name, args)| ToolCall {
            id: id.to_string(),
            kind: "function".into(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: args.to_string(),
            },
        })
        .collect();
    Run {
        required_action: Some(RequiredAction {
            kind: "submit_tool_outputs".into(),
            submit_tool_outputs: Some(SubmitToolOutputs { tool_calls }),
        }),
        ..run(RunStatus::RequiresAction)
    }
}

pub(crate) fn failed_run(message: &str) -> Run {
    Run {
        last_error: Some(RunError {
            code: "server_error".into(),
            message: message.into(),
        }),
        ..run(RunStatus::Failed)
    }
}

#[derive(Default)]
struct State {
    next_id: usize,
    threads_created: usize,
    messages: HashMap<String, Vec<ThreadMessage>>,
    script: VecDeque<Run>,
    reply: Option<String>,
    submitted: Vec<Vec<ToolOutput>>,
    cancelled: Vec<String>,
    retrieves: usize,
}

/// Scripted assistant service. `retrieve_run` pops the next scripted run
/// (or reports `completed` once the script is exhausted); a completed run
/// appends the configured reply to the thread.
#[derive(Default)]
pub(crate) struct FakeAssistant {
    state: Mutex<State>,
    cancel_fails: bool,
}

impl FakeAssistant {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(runs: Vec<Run>, reply: Option<&str>) -> Self {
        let fake = Self::new();
        {
            let mut state = fake.state.lock().unwrap();
            state.script = runs.into();
            state.reply = reply.map(str::to_string);
        }
        fake
    }

    pub(crate) fn failing_cancel(mut self) -> Self {
        self.cancel_fails = true;
        self
    }

    pub(crate) fn threads_created(&self) -> usize {
        self.state.lock().unwrap().threads_created
    }

    /// Messages of a thread in insertion order.
    pub(crate) fn messages(&self, thread_id: &str) -> Vec<ThreadMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn submitted(&self) -> Vec<Vec<ToolOutput>> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub(crate) fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub(crate) fn retrieves(&self) -> usize {
        self.state.lock().unwrap().retrieves
    }

    fn push_message(state: &mut State, thread_id: &str, role: Role, content: &str) -> ThreadMessage {
        state.next_id += 1;
        let message = ThreadMessage {
            id: format!("msg_{}", state.next_id),
            role,
            content: vec![MessageContent::Text {
                text: TextContent {
                    value: content.to_string(),
                },
            }],
            created_at: 1_700_000_000 + state.next_id as i64,
        };
        state
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }
}

#[async_trait]
impl AssistantApi for FakeAssistant {
    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.threads_created += 1;
        state.next_id += 1;
        Ok(Thread {
            id: format!("thread_{}", state.next_id),
            created_at: 1_700_000_000,
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AssistantError> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::push_message(&mut state, thread_id, role, content))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
        let state = self.state.lock().unwrap();
        let mut messages = state.messages.get(thread_id).cloned().unwrap_or_default();
        messages.reverse();
        Ok(messages)
    }

    async fn create_run(&self, thread_id: &str, _assistant_id: &str) -> Result<Run, AssistantError> {
        Ok(Run {
            thread_id: thread_id.to_string(),
            ..run(RunStatus::Queued)
        })
    }

    async fn retrieve_run(&self, thread_id: &str, _run_id: &str) -> Result<Run, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.retrieves += 1;
        let next = state
            .script
            .pop_front()
            .unwrap_or_else(|| run(RunStatus::Completed));
        if next.status == RunStatus::Completed
            && let Some(reply) = state.reply.clone()
        {
            Self::push_message(&mut state, thread_id, Role::Assistant, &reply);
        }
        Ok(next)
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        self.state.lock().unwrap().submitted.push(outputs.to_vec());
        Ok(run(RunStatus::Queued))
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        self.state.lock().unwrap().cancelled.push(run_id.to_string());
        if self.cancel_fails {
            return Err(AssistantError::Api {
                operation: "cancel run",
                status: 400,
                body: "run already completed".into(),
            });
        }
        Ok(run(RunStatus::Cancelling))
    }
}
