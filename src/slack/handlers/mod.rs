//! Handlers for inbound Slack events.
//!
//! Each handler runs against a [`ChatGateway`] and the repositories it
//! needs rather than the whole application state, so the same code serves
//! Socket Mode events and tests.

pub mod admin;
pub mod emoji;
pub mod export;
pub mod home;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::orchestrator::context::load_workspace;
use crate::persistence::workspace_repo::WorkspaceRepo;
use crate::slack::commands::{self, Command};
use crate::slack::gateway::{ChatGateway, OutgoingMessage};
use crate::{AppError, Result};

/// One direct message to the bot, with what is needed to answer it.
pub struct DirectMessage<'a> {
    /// Workspace gateway.
    pub gateway: &'a dyn ChatGateway,
    /// Workspace settings store.
    pub repo: &'a WorkspaceRepo,
    /// Slack team id.
    pub team_id: &'a str,
    /// Sender.
    pub user_id: &'a str,
    /// DM channel the message arrived in; replies go here.
    pub channel_id: &'a str,
    /// Lifetime of `king me` passcodes.
    pub passcode_ttl: chrono::Duration,
    /// Reference date, used to preview channel names.
    pub today: NaiveDate,
}

/// Execute `command` and produce the reply text.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` for admin commands from non-admins,
/// `AppError::Validation` for bad arguments, or the underlying store or
/// gateway error.
pub async fn execute(dm: &DirectMessage<'_>, command: Command) -> Result<String> {
    let config = load_workspace(dm.gateway, dm.repo, dm.team_id).await?;
    let is_admin = config.is_admin(dm.user_id);
    if command.requires_admin() && !is_admin {
        return Err(AppError::Unauthorized(
            "only check-in admins can do that. Send me `king me` to become one".into(),
        ));
    }

    match command {
        Command::Help => Ok(commands::help_text(is_admin)),
        Command::Export(channel) => export::export_own_messages(dm, &channel).await,
        Command::KingMe if is_admin => Ok("You're already a check-in admin.".into()),
        other => admin::run(dm, &config, other).await,
    }
}

fn error_reply(err: &AppError) -> String {
    match err {
        AppError::Validation(msg) | AppError::Unauthorized(msg) => {
            let mut chars = msg.chars();
            chars.next().map_or_else(String::new, |first| {
                format!("{}{}.", first.to_uppercase(), chars.as_str().trim_end_matches('.'))
            })
        }
        AppError::NotFound(msg) => format!("I couldn't find that: {msg}."),
        other => format!("Something went wrong: {other}"),
    }
}

/// Parse, execute, and answer one DM. Failures are replied to the sender.
pub async fn handle_direct_message(dm: &DirectMessage<'_>, text: &str) {
    let reply = match commands::parse(text) {
        Ok(command) => {
            info!(team_id = dm.team_id, user_id = dm.user_id, ?command, "dm command");
            execute(dm, command).await
        }
        Err(err) => Err(err),
    };

    let text = match reply {
        Ok(text) => text,
        Err(err) => {
            if !matches!(err, AppError::Validation(_) | AppError::Unauthorized(_)) {
                warn!(team_id = dm.team_id, user_id = dm.user_id, %err, "dm command failed");
            }
            error_reply(&err)
        }
    };

    if let Err(err) = dm
        .gateway
        .post_message(OutgoingMessage::new(dm.channel_id, text))
        .await
    {
        warn!(team_id = dm.team_id, channel_id = dm.channel_id, %err, "dm reply failed");
    }
}
