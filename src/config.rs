//! Configuration types.
//!
//! Everything is read once from the environment in `main` and handed to each
//! component at construction time. `from_lookup` variants take any key lookup
//! so tests can build synthetic configurations without touching process env.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::prompts::AssistantKind;

/// Environment-style key lookup.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(lookup: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    non_empty(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str) -> Option<T> {
    non_empty(lookup, key).and_then(|s| s.parse().ok())
}

fn secret(lookup: Lookup<'_>, key: &str) -> Result<SecretString, ConfigError> {
    required(lookup, key).map(SecretString::from)
}

// ── Application ─────────────────────────────────────────────────────

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub orchestrator: OrchestratorConfig,
    pub gmail: Option<GmailConfig>,
    pub slack: Option<SlackConfig>,
    pub trello: Option<TrelloConfig>,
    pub bookkeeping: Option<BookkeepingConfig>,
    pub prompts: PromptConfig,
    pub store: StoreConfig,
    pub jobs: JobsConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            openai: OpenAiConfig::from_lookup(lookup)?,
            orchestrator: OrchestratorConfig::from_lookup(lookup),
            gmail: GmailConfig::from_lookup(lookup)?,
            slack: SlackConfig::from_lookup(lookup),
            trello: TrelloConfig::from_lookup(lookup)?,
            bookkeeping: BookkeepingConfig::from_lookup(lookup)?,
            prompts: PromptConfig::from_lookup(lookup),
            store: StoreConfig::from_lookup(lookup),
            jobs: JobsConfig::from_lookup(lookup),
            server: ServerConfig::from_lookup(lookup),
        })
    }
}

// ── Assistant service ───────────────────────────────────────────────

/// Assistant service credentials and the IDs of the provisioned assistants.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub assistants: AssistantIds,
}

/// IDs of the three assistants, when provisioned.
#[derive(Debug, Clone, Default)]
pub struct AssistantIds {
    pub handle_inbox: Option<String>,
    pub daily_report: Option<String>,
    pub chat: Option<String>,
}

impl AssistantIds {
    pub fn get(&self, kind: AssistantKind) -> Option<&str> {
        match kind {
            AssistantKind::HandleInbox => self.handle_inbox.as_deref(),
            AssistantKind::DailyReport => self.daily_report.as_deref(),
            AssistantKind::Chat => self.chat.as_deref(),
        }
    }
}

impl OpenAiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: secret(lookup, "OPENAI_API_KEY")?,
            base_url: non_empty(lookup, "OPENAI_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            assistants: AssistantIds {
                handle_inbox: non_empty(lookup, AssistantKind::HandleInbox.id_env_key()),
                daily_report: non_empty(lookup, AssistantKind::DailyReport.id_env_key()),
                chat: non_empty(lookup, AssistantKind::Chat.id_env_key()),
            },
        })
    }
}

/// Run orchestration tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between run status polls.
    pub poll_interval: Duration,
    /// Identical (name, arguments) tool calls allowed before a run is aborted.
    pub max_tool_call_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_tool_call_attempts: 3,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: parsed::<u64>(lookup, "ASSISTANT_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_tool_call_attempts: parsed(lookup, "ASSISTANT_MAX_TOOL_CALL_ATTEMPTS")
                .unwrap_or(defaults.max_tool_call_attempts),
        }
    }
}

// ── Providers ───────────────────────────────────────────────────────

/// Gmail OAuth credentials. `None` when no refresh token is configured.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    pub api_base: String,
    pub token_url: String,
}

impl GmailConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(refresh_token) = non_empty(lookup, "GMAIL_REFRESH_TOKEN") else {
            return Ok(None);
        };
        let client_id = non_empty(lookup, "GMAIL_CLIENT_ID")
            .or_else(|| non_empty(lookup, "VITE_GMAIL_CLIENT_ID"))
            .ok_or_else(|| ConfigError::MissingEnvVar("GMAIL_CLIENT_ID".to_string()))?;

        Ok(Some(Self {
            client_id,
            client_secret: secret(lookup, "GMAIL_CLIENT_SECRET")?,
            refresh_token: SecretString::from(refresh_token),
            api_base: non_empty(lookup, "GMAIL_API_BASE")
                .unwrap_or_else(|| Self::DEFAULT_API_BASE.to_string()),
            token_url: non_empty(lookup, "GMAIL_TOKEN_URL")
                .unwrap_or_else(|| Self::DEFAULT_TOKEN_URL.to_string()),
        }))
    }
}

/// Slack bot configuration. `None` when no bot token is configured.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    /// Used to tell the bot's own messages apart in thread history.
    pub bot_user_id: Option<String>,
    /// When set, every `slack_send_message` call is routed here.
    pub report_channel: Option<String>,
    pub api_base: String,
}

impl SlackConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://slack.com/api";

    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        let token = non_empty(lookup, "SLACK_BOT_TOKEN")?;
        Some(Self {
            bot_token: SecretString::from(token),
            bot_user_id: non_empty(lookup, "SLACK_BOT_USER_ID"),
            report_channel: non_empty(lookup, "SLACK_REPORT_CHANNEL_ID"),
            api_base: non_empty(lookup, "SLACK_API_BASE")
                .unwrap_or_else(|| Self::DEFAULT_API_BASE.to_string()),
        })
    }
}

/// Trello board credentials. `None` when no API key is configured.
#[derive(Debug, Clone)]
pub struct TrelloConfig {
    pub api_key: String,
    pub api_token: SecretString,
    pub inbox_list_id: Option<String>,
    pub api_base: String,
}

impl TrelloConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.trello.com/1";

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = non_empty(lookup, "TRELLO_API_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            api_key,
            api_token: secret(lookup, "TRELLO_API_TOKEN")?,
            inbox_list_id: non_empty(lookup, "TRELLO_INBOX_LIST_ID"),
            api_base: non_empty(lookup, "TRELLO_API_BASE")
                .unwrap_or_else(|| Self::DEFAULT_API_BASE.to_string()),
        }))
    }
}

/// Outbound SMTP used to forward emails to the bookkeeper.
#[derive(Debug, Clone)]
pub struct BookkeepingConfig {
    pub recipient: String,
    /// Label added to a message once it has been forwarded.
    pub sent_label: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl BookkeepingConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let (Some(recipient), Some(smtp_host)) = (
            non_empty(lookup, "BOOKKEEPING_EMAIL"),
            non_empty(lookup, "SMTP_HOST"),
        ) else {
            return Ok(None);
        };
        let username = non_empty(lookup, "SMTP_USERNAME").unwrap_or_default();
        Ok(Some(Self {
            recipient,
            sent_label: non_empty(lookup, "GMAIL_LABEL_ID_SENT_TO_BOOKKEEPING"),
            smtp_host,
            smtp_port: parsed(lookup, "SMTP_PORT").unwrap_or(587),
            from_address: non_empty(lookup, "SMTP_FROM_ADDRESS")
                .unwrap_or_else(|| username.clone()),
            password: secret(lookup, "SMTP_PASSWORD")?,
            username,
        }))
    }
}

/// Location of the per-assistant system prompt files.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub dir: PathBuf,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("documentation/system-prompts"),
        }
    }
}

impl PromptConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        non_empty(lookup, "SYSTEM_PROMPTS_DIR")
            .map(|dir| Self {
                dir: PathBuf::from(dir),
            })
            .unwrap_or_default()
    }
}

/// Thread-mapping persistence. No path means an in-memory store.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            path: non_empty(lookup, "INBOX_ASSIST_DB_PATH").map(PathBuf::from),
        }
    }
}

// ── Jobs & server ───────────────────────────────────────────────────

/// Scheduled job configuration. Cron expressions use the six-field
/// (seconds-first) syntax and are evaluated in UTC.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    pub enabled: bool,
    pub handle_inbox_schedule: String,
    pub daily_report_schedule: String,
    /// Cap on emails processed per Handle-Inbox run.
    pub email_limit: Option<u32>,
    pub tick_interval: Duration,
    /// Wall-clock budget for one job. `None` leaves runs unbounded.
    pub job_timeout: Option<Duration>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            handle_inbox_schedule: "0 */15 * * * *".to_string(),
            daily_report_schedule: "0 0 19 * * *".to_string(),
            email_limit: None,
            tick_interval: Duration::from_secs(30),
            job_timeout: None,
        }
    }
}

impl JobsConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: non_empty(lookup, "INBOX_ASSIST_CRON_ENABLED")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(defaults.enabled),
            handle_inbox_schedule: non_empty(lookup, "HANDLE_INBOX_CRON")
                .unwrap_or(defaults.handle_inbox_schedule),
            daily_report_schedule: non_empty(lookup, "DAILY_REPORT_CRON")
                .unwrap_or(defaults.daily_report_schedule),
            email_limit: parsed::<u32>(lookup, "LIMIT_EMAIL_HANDLING").filter(|n| *n > 0),
            tick_interval: parsed::<u64>(lookup, "JOB_TICK_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tick_interval),
            job_timeout: parsed::<u64>(lookup, "JOB_TIMEOUT_SECS").map(Duration::from_secs),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ServerConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            port: parsed(lookup, "INBOX_ASSIST_PORT").unwrap_or(8080),
        }
    }
}
