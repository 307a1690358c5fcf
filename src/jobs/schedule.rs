//! Cron schedules and the ticker that fires due jobs.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::JobsConfig;
use crate::error::JobError;
use crate::jobs::{JobKind, JobRunner};

/// A job bound to a cron expression.
pub struct JobSchedule {
    kind: JobKind,
    schedule: cron::Schedule,
    next: Option<DateTime<Utc>>,
    running: Arc<AtomicBool>,
}

impl JobSchedule {
    /// Parse `expr` and compute the first fire time after `from`.
    pub fn parse(kind: JobKind, expr: &str, from: DateTime<Utc>) -> Result<Self, JobError> {
        let schedule = cron::Schedule::from_str(expr).map_err(|e| JobError::InvalidSchedule {
            job: kind.to_string(),
            reason: e.to_string(),
        })?;
        let next = schedule.after(&from).next();
        Ok(Self {
            kind,
            schedule,
            next,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.next
    }

    /// Whether the job is due at `now`. A due schedule moves on to its next
    /// fire time after `now`, so missed fires collapse into one.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.next {
            Some(next) if next <= now => {
                self.next = self.schedule.after(&now).next();
                true
            }
            _ => false,
        }
    }
}

/// Marks a job as running until dropped, including when its task panics.
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Self(flag.clone()))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Schedules for every job, from configuration.
pub fn schedules_from_config(
    config: &JobsConfig,
    from: DateTime<Utc>,
) -> Result<Vec<JobSchedule>, JobError> {
    Ok(vec![
        JobSchedule::parse(JobKind::HandleInbox, &config.handle_inbox_schedule, from)?,
        JobSchedule::parse(JobKind::DailyReport, &config.daily_report_schedule, from)?,
    ])
}

/// Spawn the cron ticker background task. A job still running from its
/// previous fire is skipped.
pub fn spawn_cron_ticker(
    jobs: Arc<JobRunner>,
    mut schedules: Vec<JobSchedule>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    for schedule in &schedules {
        if let Some(next) = schedule.next_fire() {
            tracing::info!(job = %schedule.kind(), next = %next, "Scheduled job");
        }
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let now = Utc::now();
            for schedule in schedules.iter_mut() {
                if !schedule.take_due(now) {
                    continue;
                }
                let kind = schedule.kind();
                let Some(guard) = RunningGuard::try_acquire(&schedule.running) else {
                    tracing::warn!(job = %kind, "Previous run still in progress, skipping");
                    continue;
                };

                let jobs = jobs.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    match jobs.run(kind).await {
                        Ok(report) => {
                            tracing::info!(job = %kind, status = %report.result.status, "Scheduled job done")
                        }
                        Err(e) => tracing::error!(job = %kind, error = %e, "Scheduled job failed"),
                    }
                });
            }
        }
    })
}
