use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use inbox_assist::agent::AssistantRunner;
use inbox_assist::assistant::OpenAiAssistantClient;
use inbox_assist::channels::{BookkeepingMailer, GmailClient, SlackClient, TrelloClient};
use inbox_assist::config::AppConfig;
use inbox_assist::jobs::schedule::schedules_from_config;
use inbox_assist::jobs::{ChatWorker, JobRunner, spawn_cron_ticker};
use inbox_assist::prompts::PromptStore;
use inbox_assist::server::{self, AppState};
use inbox_assist::setup::setup_assistants;
use inbox_assist::store;
use inbox_assist::tools::ToolRegistry;
use inbox_assist::tools::builtin::{Providers, register_builtin_tools};

/// Console logging, plus a daily rolling file when `INBOX_ASSIST_LOG_DIR` is
/// set. The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var("INBOX_ASSIST_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "inbox-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let _log_guard = init_tracing();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    eprintln!("📬 Inbox Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   HTTP: http://0.0.0.0:{}", config.server.port);
    eprintln!("   Prompts: {}", config.prompts.dir.display());

    // ── Store ───────────────────────────────────────────────────────────
    let store = store::open(&config.store)
        .await
        .context("Failed to open thread store")?;
    match &config.store.path {
        Some(path) => eprintln!("   Store: {}", path.display()),
        None => eprintln!("   Store: in-memory"),
    }

    // ── Providers & tools ───────────────────────────────────────────────
    let prompts = Arc::new(PromptStore::new(&config.prompts));
    let slack = config.slack.clone().map(|c| Arc::new(SlackClient::new(c)));
    let providers = Providers {
        gmail: config.gmail.clone().map(|c| Arc::new(GmailClient::new(c))),
        slack: slack.clone(),
        trello: config.trello.clone().map(|c| Arc::new(TrelloClient::new(c))),
        bookkeeping: config
            .bookkeeping
            .clone()
            .map(|c| Arc::new(BookkeepingMailer::new(c))),
        prompts: prompts.clone(),
    };

    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry, &providers);
    eprintln!("   Tools: {} registered", registry.count());

    // ── Assistants ──────────────────────────────────────────────────────
    let assistant = Arc::new(OpenAiAssistantClient::new(&config.openai));
    let assistants = config.openai.assistants.clone();

    if std::env::var("INBOX_ASSIST_SETUP").is_ok_and(|v| v.trim() == "1") {
        let provisioned = setup_assistants(assistant.as_ref(), &registry, &prompts, &assistants)
            .await
            .context("Assistant setup failed")?;
        for p in &provisioned {
            eprintln!(
                "   Assistant {}: {} ({})",
                p.kind.display_name(),
                p.assistant_id,
                if p.created { "created" } else { "updated" }
            );
        }
    }

    let runner = AssistantRunner::new(
        assistant,
        store,
        registry.clone(),
        config.orchestrator.clone(),
    );

    // ── Jobs & chat ─────────────────────────────────────────────────────
    let report_channel = config
        .slack
        .as_ref()
        .and_then(|s| s.report_channel.clone());
    let jobs = Arc::new(JobRunner::new(
        runner.clone(),
        assistants.clone(),
        report_channel,
        &config.jobs,
    ));

    let chat = match (slack, assistants.chat.clone()) {
        (Some(slack), Some(chat_id)) => {
            eprintln!("   Chat: enabled");
            Some(Arc::new(ChatWorker::new(runner, slack, chat_id)))
        }
        _ => {
            eprintln!("   Chat: disabled (needs SLACK_BOT_TOKEN and CHAT_OPENAI_ASSISTANT_ID)");
            None
        }
    };

    let _cron_handle = if config.jobs.enabled {
        let schedules =
            schedules_from_config(&config.jobs, Utc::now()).context("Invalid job schedule")?;
        eprintln!(
            "   Jobs: enabled (tick every {}s)",
            config.jobs.tick_interval.as_secs()
        );
        Some(spawn_cron_ticker(
            jobs.clone(),
            schedules,
            config.jobs.tick_interval,
        ))
    } else {
        eprintln!("   Jobs: disabled");
        None
    };

    // ── HTTP ────────────────────────────────────────────────────────────
    let state = AppState {
        dispatcher: registry,
        jobs,
        chat,
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        tracing::info!("Shutting down");
    };
    server::serve(&config.server, state, shutdown)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
