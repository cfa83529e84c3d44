//! OAuth installation repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::installation::Installation;
use crate::{AppError, Result};

use super::db::Database;

/// Repository for per-team bot credentials.
#[derive(Clone)]
pub struct InstallationRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct InstallationRow {
    team_id: String,
    team_name: String,
    bot_token: String,
    bot_user_id: Option<String>,
    installed_at: String,
}

impl InstallationRow {
    fn into_installation(self) -> Result<Installation> {
        let installed_at = DateTime::parse_from_rfc3339(&self.installed_at)
            .map_err(|e| AppError::Db(format!("invalid installed_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Installation {
            team_id: self.team_id,
            team_name: self.team_name,
            bot_token: self.bot_token,
            bot_user_id: self.bot_user_id,
            installed_at,
        })
    }
}

impl InstallationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store an installation, replacing the token of a re-install.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn upsert(&self, installation: &Installation) -> Result<()> {
        sqlx::query(
            "INSERT INTO installation (team_id, team_name, bot_token, bot_user_id, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(team_id) DO UPDATE SET
                team_name = excluded.team_name,
                bot_token = excluded.bot_token,
                bot_user_id = excluded.bot_user_id,
                installed_at = excluded.installed_at",
        )
        .bind(&installation.team_id)
        .bind(&installation.team_name)
        .bind(&installation.bot_token)
        .bind(&installation.bot_user_id)
        .bind(installation.installed_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Look up the installation for a team.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_by_team(&self, team_id: &str) -> Result<Option<Installation>> {
        let row: Option<InstallationRow> = sqlx::query_as(
            "SELECT team_id, team_name, bot_token, bot_user_id, installed_at
             FROM installation WHERE team_id = ?1",
        )
        .bind(team_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(InstallationRow::into_installation).transpose()
    }

    /// Every installation, ordered by team id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self) -> Result<Vec<Installation>> {
        let rows: Vec<InstallationRow> = sqlx::query_as(
            "SELECT team_id, team_name, bot_token, bot_user_id, installed_at
             FROM installation ORDER BY team_id ASC",
        )
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter()
            .map(InstallationRow::into_installation)
            .collect()
    }
}
