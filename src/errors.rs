//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid configuration, either global or per workspace.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Slack Web API or Socket Mode failure.
    Slack(String),
    /// Language-model request failure.
    Llm(String),
    /// Malformed command input supplied by a Slack user.
    Validation(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Caller is not authorized to perform the requested action.
    Unauthorized(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether this error came from an external service call (Slack or LLM).
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Slack(_) | Self::Llm(_))
    }

    /// Whether Slack refused the call because of workspace permission settings.
    #[must_use]
    pub fn is_restricted_action(&self) -> bool {
        matches!(self, Self::Slack(msg) if msg.contains("restricted_action"))
    }

    /// Whether an invite failed only because the user is already a member.
    #[must_use]
    pub fn is_already_in_channel(&self) -> bool {
        matches!(self, Self::Slack(msg) if msg.contains("already_in_channel"))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::Llm(msg) => write!(f, "llm: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Db(format!("invalid stored json: {err}"))
    }
}

impl From<slack_morphism::errors::SlackClientError> for AppError {
    fn from(err: slack_morphism::errors::SlackClientError) -> Self {
        Self::Slack(err.to_string())
    }
}
