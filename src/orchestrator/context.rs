//! Per-workspace values threaded explicitly through every lifecycle step.

use std::collections::BTreeSet;

use crate::models::workspace::WorkspaceConfig;
use crate::persistence::workspace_repo::WorkspaceRepo;
use crate::slack::gateway::ChatGateway;
use crate::Result;

/// Stored settings for `team_id`, creating the record (named via
/// `team.info`) the first time the workspace is seen.
///
/// # Errors
///
/// Returns `AppError::Db` on store failure or `AppError::Slack` if the
/// team name lookup fails for a new workspace.
pub async fn load_workspace(
    gateway: &dyn ChatGateway,
    repo: &WorkspaceRepo,
    team_id: &str,
) -> Result<WorkspaceConfig> {
    if let Some(config) = repo.get(team_id).await? {
        return Ok(config);
    }
    let team_name = gateway.team_name().await?;
    repo.ensure_exists(team_id, &team_name).await
}

/// Everything a lifecycle step needs to know about the workspace it serves.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    /// Slack team id.
    pub team_id: String,
    /// Settings snapshot taken at the start of the run.
    pub config: WorkspaceConfig,
    /// The bot's own user id in this workspace.
    pub bot_user_id: String,
}

impl WorkspaceContext {
    /// Bundle a settings snapshot with the bot identity.
    #[must_use]
    pub fn new(config: WorkspaceConfig, bot_user_id: impl Into<String>) -> Self {
        Self {
            team_id: config.team_id.clone(),
            config,
            bot_user_id: bot_user_id.into(),
        }
    }

    /// Users never reminded, removed, or counted as participants.
    #[must_use]
    pub fn exempt_users(&self) -> BTreeSet<String> {
        let mut exempt = self.config.admins.clone();
        exempt.insert(self.bot_user_id.clone());
        exempt
    }
}
