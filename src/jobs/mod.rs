//! Scheduled jobs and the Slack chat worker. Each builds an instruction and
//! hands it to the assistant runner.

pub mod chat;
pub mod schedule;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::agent::{AssistantRunner, ResponseFormat, RunOutcome};
use crate::config::{AssistantIds, JobsConfig};
use crate::error::{Error, JobError, Result};
use crate::prompts::AssistantKind;

pub use chat::{ChatDisposition, ChatWorker, SlackEvent};
pub use schedule::{JobSchedule, spawn_cron_ticker};

/// A job that can be scheduled or triggered by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    HandleInbox,
    DailyReport,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::HandleInbox, JobKind::DailyReport];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "handle-inbox" | "hi" => Some(Self::HandleInbox),
            "daily-report" | "dare" => Some(Self::DailyReport),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HandleInbox => "handle-inbox",
            Self::DailyReport => "daily-report",
        }
    }

    pub fn assistant(&self) -> AssistantKind {
        match self {
            Self::HandleInbox => AssistantKind::HandleInbox,
            Self::DailyReport => AssistantKind::DailyReport,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn handle_inbox_instruction(limit: Option<u32>) -> String {
    match limit {
        Some(n) => {
            let emails = if n > 1 { "emails" } else { "email" };
            format!(
                "Please process only {n} {emails} from my inbox according to your instructions. \
                 Filter for emails without the \"processed-by-hi\" label and limit to {n} {emails} for this run."
            )
        }
        None => "Please process my inbox according to your instructions. \
                 Filter for emails without the \"processed-by-hi\" label."
            .to_string(),
    }
}

pub fn daily_report_instruction(channel: &str) -> String {
    format!(
        "Please create a daily summary report for emails labeled \"to-summarize\" from the last 24 hours. \
         Post the summary to the Slack channel {channel}."
    )
}

/// Result of one job run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: JobKind,
    pub message: String,
    pub thread_id: Option<String>,
    pub result: RunOutcome,
}

/// Runs jobs on fresh, keyless threads with structured output.
pub struct JobRunner {
    runner: AssistantRunner,
    assistants: AssistantIds,
    report_channel: Option<String>,
    email_limit: Option<u32>,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(
        runner: AssistantRunner,
        assistants: AssistantIds,
        report_channel: Option<String>,
        config: &JobsConfig,
    ) -> Self {
        Self {
            runner,
            assistants,
            report_channel,
            email_limit: config.email_limit,
            timeout: config.job_timeout,
        }
    }

    pub fn instruction(&self, kind: JobKind) -> std::result::Result<String, JobError> {
        match kind {
            JobKind::HandleInbox => Ok(handle_inbox_instruction(self.email_limit)),
            JobKind::DailyReport => {
                let channel =
                    self.report_channel
                        .as_deref()
                        .ok_or_else(|| JobError::MissingConfig {
                            job: kind.to_string(),
                            key: "SLACK_REPORT_CHANNEL_ID".into(),
                        })?;
                Ok(daily_report_instruction(channel))
            }
        }
    }

    pub async fn run(&self, kind: JobKind) -> Result<JobReport> {
        let assistant = kind.assistant();
        let assistant_id =
            self.assistants
                .get(assistant)
                .ok_or_else(|| JobError::MissingConfig {
                    job: kind.to_string(),
                    key: assistant.id_env_key().into(),
                })?;
        let instruction = self.instruction(kind)?;

        tracing::info!(job = %kind, "Starting job");
        let run = self
            .runner
            .run_instruction(assistant_id, None, &instruction, ResponseFormat::Json);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                Error::from(JobError::Timeout {
                    job: kind.to_string(),
                    seconds: limit.as_secs(),
                })
            })??,
            None => run.await?,
        };

        if let Some(error) = result.latest.as_ref().and_then(|m| m.parse_error.as_deref()) {
            tracing::warn!(job = %kind, error, "Job reply was not valid JSON");
        }
        tracing::info!(job = %kind, status = %result.status, "Job finished");

        Ok(JobReport {
            job: kind,
            message: format!("{} job completed successfully", assistant.display_name()),
            thread_id: result.thread_id.clone(),
            result,
        })
    }
}
