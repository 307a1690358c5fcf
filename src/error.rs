//! Error types for inbox-assist.

pub use crate::tools::ToolError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors talking to the remote assistant service.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Assistant request {operation} failed: {reason}")]
    RequestFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("Assistant request {operation} returned {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response for {operation}: {reason}")]
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },

    #[error("No thread bound for {operation}")]
    NoThread { operation: &'static str },
}

/// Key-value persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from downstream providers (email, chat, board, SMTP).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{provider} returned {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} API error: {reason}")]
    Rejected { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for {provider}: {reason}")]
    AuthFailed { provider: String, reason: String },

    #[error("{provider} is not configured")]
    NotConfigured { provider: String },
}

impl ProviderError {
    pub(crate) fn request(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            provider: provider.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn invalid(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Scheduled job errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {job} is missing configuration: {key}")]
    MissingConfig { job: String, key: String },

    #[error("Job {job} timed out after {seconds}s")]
    Timeout { job: String, seconds: u64 },

    #[error("Invalid cron schedule for {job}: {reason}")]
    InvalidSchedule { job: String, reason: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
