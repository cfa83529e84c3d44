//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keyring service name under which bot secrets are stored.
const KEYRING_SERVICE: &str = "checkin-bot";

/// Slack application settings.
///
/// Tokens and the client secret are loaded at runtime via OS keychain or
/// environment variables, never from the TOML file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// OAuth client id of the Slack app.
    #[serde(default)]
    pub client_id: String,
    /// Redirect URL registered with the Slack app for OAuth installs.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Single-workspace bot token used when no OAuth installation exists.
    #[serde(skip)]
    pub bot_token: Option<String>,
    /// OAuth client secret (populated at runtime).
    #[serde(skip)]
    pub client_secret: Option<String>,
}

/// Language-model settings for emoji suggestions.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Chat model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Number of emoji requested from the model.
    #[serde(default = "default_emoji_count")]
    pub emoji_count: usize,
    /// Upper bound on reactions added to a single message.
    #[serde(default = "default_max_reactions")]
    pub max_reactions: usize,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            emoji_count: default_emoji_count(),
            max_reactions: default_max_reactions(),
            api_key: None,
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4".into()
}

fn default_emoji_count() -> usize {
    4
}

fn default_max_reactions() -> usize {
    5
}

/// Monthly lifecycle tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LifecycleConfig {
    /// Target number of participants per group channel.
    #[serde(default = "default_target_group_size")]
    pub target_group_size: usize,
    /// Fixed offset of the reference timezone from UTC, in hours.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Local hour after which the daily scheduled run fires.
    #[serde(default = "default_run_hour")]
    pub run_hour: u32,
    /// Reaction name that opts a user in as a daily poster.
    #[serde(default = "default_daily_reaction")]
    pub daily_reaction: String,
    /// Reaction name that opts a user in as a weekly poster.
    #[serde(default = "default_weekly_reaction")]
    pub weekly_reaction: String,
    /// Days of history inspected when auto-adding active users.
    #[serde(default = "default_auto_add_lookback_days")]
    pub auto_add_lookback_days: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            target_group_size: default_target_group_size(),
            utc_offset_hours: default_utc_offset_hours(),
            run_hour: default_run_hour(),
            daily_reaction: default_daily_reaction(),
            weekly_reaction: default_weekly_reaction(),
            auto_add_lookback_days: default_auto_add_lookback_days(),
        }
    }
}

fn default_target_group_size() -> usize {
    11
}

fn default_utc_offset_hours() -> i32 {
    -8
}

fn default_run_hour() -> u32 {
    9
}

fn default_daily_reaction() -> String {
    "sunny".into()
}

fn default_weekly_reaction() -> String {
    "calendar".into()
}

fn default_auto_add_lookback_days() -> u32 {
    7
}

/// Per-call limits applied to outbound HTTP requests.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    /// Timeout for a single Slack or LLM call.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Retries after the first failed attempt of a transient error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

impl HttpConfig {
    /// Per-call timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Admin bootstrap settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AdminConfig {
    /// Lifetime of a `king me` passcode.
    #[serde(default = "default_passcode_ttl_seconds")]
    pub passcode_ttl_seconds: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            passcode_ttl_seconds: default_passcode_ttl_seconds(),
        }
    }
}

fn default_passcode_ttl_seconds() -> u64 {
    600
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/checkin-bot.db")
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file holding workspace settings and installations.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// HTTP port for the OAuth redirect and health endpoints.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Slack app settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Emoji suggestion model settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Monthly lifecycle settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Outbound call limits.
    #[serde(default)]
    pub http: HttpConfig,
    /// Admin bootstrap settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from OS keychain with env-var fallback.
    ///
    /// The Socket Mode app token is required. The fallback bot token, the
    /// OAuth client secret, and the LLM API key are optional; features that
    /// need them degrade with a warning.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the app token cannot be found.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.app_token = load_credential("slack_app_token", "SLACK_APP_TOKEN").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN")
            .await
            .ok();
        self.slack.client_secret = load_credential("slack_client_secret", "SLACK_CLIENT_SECRET")
            .await
            .ok();
        self.llm.api_key = load_credential("openai_api_key", "OPENAI_API_KEY").await.ok();

        if self.llm.api_key.is_none() {
            warn!("no language-model api key configured; emoji reactions are disabled");
        }
        Ok(())
    }

    /// Passcode lifetime as a [`chrono::Duration`].
    #[must_use]
    pub fn passcode_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.admin.passcode_ttl_seconds).unwrap_or(i64::MAX))
    }

    fn validate(&self) -> Result<()> {
        if self.lifecycle.target_group_size == 0 {
            return Err(AppError::Config(
                "lifecycle.target_group_size must be greater than zero".into(),
            ));
        }

        if !(-12..=14).contains(&self.lifecycle.utc_offset_hours) {
            return Err(AppError::Config(
                "lifecycle.utc_offset_hours must be between -12 and 14".into(),
            ));
        }

        if self.lifecycle.run_hour > 23 {
            return Err(AppError::Config(
                "lifecycle.run_hour must be between 0 and 23".into(),
            ));
        }

        if self.lifecycle.daily_reaction == self.lifecycle.weekly_reaction {
            return Err(AppError::Config(
                "daily_reaction and weekly_reaction must differ".into(),
            ));
        }

        if self.llm.max_reactions == 0 {
            return Err(AppError::Config(
                "llm.max_reactions must be greater than zero".into(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(AppError::Config(
                "http.timeout_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Config(format!(
                "credential {keyring_key} not found in keychain or {env_key} env var"
            ))
        })
}
