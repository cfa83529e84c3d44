//! OAuth installation record for a workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bot credential issued when a workspace installs the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Slack team id.
    pub team_id: String,
    /// Workspace name at install time.
    pub team_name: String,
    /// Bot user OAuth token (`xoxb-…`).
    pub bot_token: String,
    /// Bot user id in this workspace.
    pub bot_user_id: Option<String>,
    /// Install (or latest re-install) time.
    pub installed_at: DateTime<Utc>,
}

impl Installation {
    /// Record a fresh install.
    #[must_use]
    pub fn new(
        team_id: String,
        team_name: String,
        bot_token: String,
        bot_user_id: Option<String>,
    ) -> Self {
        Self {
            team_id,
            team_name,
            bot_token,
            bot_user_id,
            installed_at: Utc::now(),
        }
    }
}
