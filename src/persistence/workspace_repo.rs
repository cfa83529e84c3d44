//! Workspace configuration repository for `SQLite` persistence.
//!
//! Every mutation is a read-modify-write of the whole record, so
//! concurrent admin commands resolve as last-write-wins.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::channel_format::ChannelFormat;
use crate::models::workspace::{
    AdminPasscode, AnnouncementRef, AnnouncementTag, IncompatiblePair, WorkspaceConfig,
};
use crate::{AppError, Result};

use super::db::Database;

const SELECT_COLUMNS: &str = "SELECT team_id, team_name, admins, incompatible_pairs,
    always_include_users, channel_format, announcement_channel, announcement_tag,
    custom_announcement_text, auto_add_active_users, last_announcement,
    pending_admin_passcodes, installed_at
    FROM workspace";

/// Repository for per-workspace settings.
#[derive(Clone)]
pub struct WorkspaceRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    team_id: String,
    team_name: String,
    admins: String,
    incompatible_pairs: String,
    always_include_users: String,
    channel_format: Option<String>,
    announcement_channel: Option<String>,
    announcement_tag: String,
    custom_announcement_text: String,
    auto_add_active_users: i64,
    last_announcement: Option<String>,
    pending_admin_passcodes: String,
    installed_at: String,
}

impl WorkspaceRow {
    fn into_config(self) -> Result<WorkspaceConfig> {
        let installed_at = DateTime::parse_from_rfc3339(&self.installed_at)
            .map_err(|e| AppError::Db(format!("invalid installed_at: {e}")))?
            .with_timezone(&Utc);
        let announcement_tag = self
            .announcement_tag
            .parse::<AnnouncementTag>()
            .map_err(|e| AppError::Db(format!("invalid announcement_tag: {e}")))?;
        let last_announcement = self
            .last_announcement
            .as_deref()
            .map(serde_json::from_str::<AnnouncementRef>)
            .transpose()?;

        Ok(WorkspaceConfig {
            team_id: self.team_id,
            team_name: self.team_name,
            admins: serde_json::from_str(&self.admins)?,
            incompatible_pairs: serde_json::from_str(&self.incompatible_pairs)?,
            always_include_users: serde_json::from_str(&self.always_include_users)?,
            channel_format: self.channel_format,
            announcement_channel: self.announcement_channel,
            announcement_tag,
            custom_announcement_text: self.custom_announcement_text,
            auto_add_active_users: self.auto_add_active_users != 0,
            last_announcement,
            pending_admin_passcodes: serde_json::from_str(&self.pending_admin_passcodes)?,
            installed_at,
        })
    }
}

impl WorkspaceRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch one workspace record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a stored field is corrupt.
    pub async fn get(&self, team_id: &str) -> Result<Option<WorkspaceConfig>> {
        let row: Option<WorkspaceRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE team_id = ?1"))
                .bind(team_id)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(WorkspaceRow::into_config).transpose()
    }

    /// Fetch every workspace record, ordered by team id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a stored field is corrupt.
    pub async fn get_all(&self) -> Result<Vec<WorkspaceConfig>> {
        let rows: Vec<WorkspaceRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY team_id ASC"))
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(WorkspaceRow::into_config).collect()
    }

    /// Create the record on first contact with a workspace; return it either way.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert or read-back fails.
    pub async fn ensure_exists(&self, team_id: &str, team_name: &str) -> Result<WorkspaceConfig> {
        if let Some(existing) = self.get(team_id).await? {
            return Ok(existing);
        }

        let config = WorkspaceConfig::new(team_id, team_name);
        sqlx::query(
            "INSERT OR IGNORE INTO workspace (team_id, team_name, installed_at)
             VALUES (?1, ?2, ?3)",
        )
        .bind(&config.team_id)
        .bind(&config.team_name)
        .bind(config.installed_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        info!(team_id, team_name, "workspace record created");

        self.get(team_id)
            .await?
            .ok_or_else(|| AppError::Db("workspace vanished after insert".into()))
    }

    /// Write the whole record, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the upsert fails.
    pub async fn save(&self, config: &WorkspaceConfig) -> Result<()> {
        let last_announcement = config
            .last_announcement
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO workspace (team_id, team_name, admins, incompatible_pairs,
                always_include_users, channel_format, announcement_channel, announcement_tag,
                custom_announcement_text, auto_add_active_users, last_announcement,
                pending_admin_passcodes, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(team_id) DO UPDATE SET
                team_name = excluded.team_name,
                admins = excluded.admins,
                incompatible_pairs = excluded.incompatible_pairs,
                always_include_users = excluded.always_include_users,
                channel_format = excluded.channel_format,
                announcement_channel = excluded.announcement_channel,
                announcement_tag = excluded.announcement_tag,
                custom_announcement_text = excluded.custom_announcement_text,
                auto_add_active_users = excluded.auto_add_active_users,
                last_announcement = excluded.last_announcement,
                pending_admin_passcodes = excluded.pending_admin_passcodes",
        )
        .bind(&config.team_id)
        .bind(&config.team_name)
        .bind(serde_json::to_string(&config.admins)?)
        .bind(serde_json::to_string(&config.incompatible_pairs)?)
        .bind(serde_json::to_string(&config.always_include_users)?)
        .bind(&config.channel_format)
        .bind(&config.announcement_channel)
        .bind(config.announcement_tag.as_str())
        .bind(&config.custom_announcement_text)
        .bind(i64::from(config.auto_add_active_users))
        .bind(last_announcement)
        .bind(serde_json::to_string(&config.pending_admin_passcodes)?)
        .bind(config.installed_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    async fn modify<R>(
        &self,
        team_id: &str,
        apply: impl FnOnce(&mut WorkspaceConfig) -> Result<R>,
    ) -> Result<R> {
        let mut config = self
            .get(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("workspace {team_id}")))?;
        let outcome = apply(&mut config)?;
        self.save(&config).await?;
        Ok(outcome)
    }

    /// Replace the admin set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn update_admins(&self, team_id: &str, admins: BTreeSet<String>) -> Result<()> {
        self.modify(team_id, |config| {
            config.admins = admins;
            Ok(())
        })
        .await?;
        info!(team_id, "workspace admins updated");
        Ok(())
    }

    /// Add one admin. Returns whether the user was newly added.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn add_admin(&self, team_id: &str, user_id: &str) -> Result<bool> {
        let added = self
            .modify(team_id, |config| Ok(config.admins.insert(user_id.to_owned())))
            .await?;
        info!(team_id, user_id, added, "admin added");
        Ok(added)
    }

    /// Record that two users must be kept apart. Returns whether it was new.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when `a == b`, `AppError::NotFound` for
    /// an unknown workspace, or `AppError::Db`.
    pub async fn add_incompatible_pair(&self, team_id: &str, a: &str, b: &str) -> Result<bool> {
        let pair = IncompatiblePair::new(a, b)?;
        self.modify(team_id, |config| Ok(config.incompatible_pairs.insert(pair)))
            .await
    }

    /// Forget an incompatibility. Returns whether the pair existed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when `a == b`, `AppError::NotFound` for
    /// an unknown workspace, or `AppError::Db`.
    pub async fn remove_incompatible_pair(&self, team_id: &str, a: &str, b: &str) -> Result<bool> {
        let pair = IncompatiblePair::new(a, b)?;
        self.modify(team_id, |config| Ok(config.incompatible_pairs.remove(&pair)))
            .await
    }

    /// Add users to the always-include list. Returns the newly added ids.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn add_always_include_users(
        &self,
        team_id: &str,
        users: &[String],
    ) -> Result<Vec<String>> {
        self.modify(team_id, |config| {
            Ok(users
                .iter()
                .filter(|user| config.always_include_users.insert((*user).clone()))
                .cloned()
                .collect())
        })
        .await
    }

    /// Remove users from the always-include list. Returns the removed ids.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn remove_always_include_users(
        &self,
        team_id: &str,
        users: &[String],
    ) -> Result<Vec<String>> {
        self.modify(team_id, |config| {
            Ok(users
                .iter()
                .filter(|user| config.always_include_users.remove(user.as_str()))
                .cloned()
                .collect())
        })
        .await
    }

    /// Validate and store a channel-name template.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a bad template (nothing is stored),
    /// `AppError::NotFound` for an unknown workspace, or `AppError::Db`.
    pub async fn update_channel_format(&self, team_id: &str, raw: &str) -> Result<ChannelFormat> {
        let format = ChannelFormat::parse(raw)?;
        let stored = format.as_str().to_owned();
        self.modify(team_id, |config| {
            config.channel_format = Some(stored);
            Ok(())
        })
        .await?;
        info!(team_id, format = format.as_str(), "channel format updated");
        Ok(format)
    }

    /// Set the channel that receives the monthly announcement.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn update_announcement_channel(&self, team_id: &str, channel_id: &str) -> Result<()> {
        self.modify(team_id, |config| {
            config.announcement_channel = Some(channel_id.to_owned());
            Ok(())
        })
        .await
    }

    /// Set the broadcast mention used by the announcement.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn update_announcement_tag(&self, team_id: &str, tag: AnnouncementTag) -> Result<()> {
        self.modify(team_id, |config| {
            config.announcement_tag = tag;
            Ok(())
        })
        .await
    }

    /// Replace the announcement body; an empty string restores the default.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn update_announcement_text(&self, team_id: &str, text: &str) -> Result<()> {
        self.modify(team_id, |config| {
            text.trim().clone_into(&mut config.custom_announcement_text);
            Ok(())
        })
        .await
    }

    /// Point at the announcement whose reactions form next month's groups.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn update_last_announcement(
        &self,
        team_id: &str,
        announcement: AnnouncementRef,
    ) -> Result<()> {
        self.modify(team_id, |config| {
            config.last_announcement = Some(announcement);
            Ok(())
        })
        .await
    }

    /// Toggle seeding the pool from recent activity.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn update_auto_add_setting(&self, team_id: &str, enabled: bool) -> Result<()> {
        self.modify(team_id, |config| {
            config.auto_add_active_users = enabled;
            Ok(())
        })
        .await
    }

    /// Issue a fresh six-digit passcode for `user_id`, replacing any pending one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn generate_admin_passcode(&self, team_id: &str, user_id: &str) -> Result<String> {
        let code = format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000);
        let passcode = AdminPasscode {
            code: code.clone(),
            issued_at: Utc::now(),
        };
        self.modify(team_id, |config| {
            config
                .pending_admin_passcodes
                .insert(user_id.to_owned(), passcode);
            Ok(())
        })
        .await?;
        Ok(code)
    }

    /// Check `code` against the user's pending passcode, consuming it on success.
    ///
    /// Expired passcodes are discarded and never verify.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown workspace or `AppError::Db`.
    pub async fn verify_admin_passcode(
        &self,
        team_id: &str,
        user_id: &str,
        code: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = Utc::now();
        let verified = self
            .modify(team_id, |config| {
                let Some(pending) = config.pending_admin_passcodes.get(user_id) else {
                    return Ok(false);
                };
                if pending.is_expired(now, ttl) {
                    warn!(user_id, "admin passcode expired");
                    config.pending_admin_passcodes.remove(user_id);
                    return Ok(false);
                }
                if pending.code != code.trim() {
                    return Ok(false);
                }
                config.pending_admin_passcodes.remove(user_id);
                Ok(true)
            })
            .await?;
        Ok(verified)
    }
}
