//! App Home tab publishing.

use tracing::info;

use crate::orchestrator::context::load_workspace;
use crate::persistence::workspace_repo::WorkspaceRepo;
use crate::slack::blocks;
use crate::slack::gateway::ChatGateway;
use crate::Result;

/// Ensure the workspace record exists and publish the Home tab for `user_id`.
///
/// # Errors
///
/// Returns the store error or `AppError::Slack` if publishing fails.
pub async fn publish_home(
    gateway: &dyn ChatGateway,
    repo: &WorkspaceRepo,
    team_id: &str,
    user_id: &str,
) -> Result<()> {
    let config = load_workspace(gateway, repo, team_id).await?;
    gateway
        .publish_home(user_id, blocks::home_blocks(&config.admin_list()))
        .await?;
    info!(team_id, user_id, "home tab published");
    Ok(())
}
