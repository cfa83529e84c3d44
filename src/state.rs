//! Shared application state handed to event handlers and background tasks.

use std::sync::Arc;

use tracing::debug;

use crate::config::GlobalConfig;
use crate::llm::EmojiSuggester;
use crate::persistence::db::Database;
use crate::persistence::installation_repo::InstallationRepo;
use crate::persistence::run_log_repo::RunLogRepo;
use crate::persistence::workspace_repo::WorkspaceRepo;
use crate::slack::client::{SlackService, SlackWorkspace};
use crate::{AppError, Result};

/// Process-wide state shared by Socket Mode callbacks, the HTTP server,
/// and the scheduler.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// `SQLite` connection pool.
    pub db: Arc<Database>,
    /// Slack client service.
    pub slack: Arc<SlackService>,
    /// Per-workspace settings.
    pub workspaces: WorkspaceRepo,
    /// OAuth bot tokens.
    pub installations: InstallationRepo,
    /// Scheduled run log.
    pub run_log: RunLogRepo,
    /// Emoji suggester; absent when no model key is configured.
    pub emoji: Option<Arc<dyn EmojiSuggester>>,
}

impl AppState {
    /// Assemble state around an open database.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        db: Arc<Database>,
        slack: Arc<SlackService>,
        emoji: Option<Arc<dyn EmojiSuggester>>,
    ) -> Self {
        Self {
            workspaces: WorkspaceRepo::new(Arc::clone(&db)),
            installations: InstallationRepo::new(Arc::clone(&db)),
            run_log: RunLogRepo::new(Arc::clone(&db)),
            config,
            db,
            slack,
            emoji,
        }
    }

    /// Gateway for `team_id`, using its OAuth installation token or the
    /// configured single-workspace bot token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if neither token exists, or
    /// `AppError::Db` if the installation lookup fails.
    pub async fn gateway_for(&self, team_id: &str) -> Result<SlackWorkspace> {
        if let Some(installation) = self.installations.find_by_team(team_id).await? {
            return Ok(self.slack.workspace(&installation.bot_token));
        }
        if let Some(token) = self.config.slack.bot_token.as_deref() {
            debug!(team_id, "no installation; using configured bot token");
            return Ok(self.slack.workspace(token));
        }
        Err(AppError::NotFound(format!(
            "no bot token for workspace {team_id}; install the app first"
        )))
    }
}
