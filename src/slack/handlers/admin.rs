//! Admin bootstrap and settings commands.

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::models::workspace::{AnnouncementRef, AnnouncementTag, WorkspaceConfig};
use crate::orchestrator::calendar::next_month;
use crate::orchestrator::messages::{channel_link, mention, mentions};
use crate::slack::commands::{ChannelRef, Command};
use crate::slack::gateway::ChatGateway;
use crate::{AppError, Result};

use super::DirectMessage;

/// Channel id for a reference, looking bare `#name`s up by name.
///
/// # Errors
///
/// Returns `AppError::NotFound` if no visible channel has that name.
pub async fn resolve_channel(gateway: &dyn ChatGateway, channel: &ChannelRef) -> Result<String> {
    match channel {
        ChannelRef::Id { id, .. } => Ok(id.clone()),
        ChannelRef::Name(name) => gateway
            .list_channels()
            .await?
            .into_iter()
            .find(|summary| &summary.name == name)
            .map(|summary| summary.id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no channel named #{name} that I can see; invite me to it first"
                ))
            }),
    }
}

fn settings_text(config: &WorkspaceConfig) -> String {
    let or_unset = |value: Option<String>| value.unwrap_or_else(|| "_not set_".to_owned());
    let pairs: Vec<String> = config
        .incompatible_pairs
        .iter()
        .map(|pair| format!("{} / {}", mention(pair.first()), mention(pair.second())))
        .collect();
    let always: Vec<String> = config.always_include_users.iter().cloned().collect();

    let mut text = format!("*Settings for {}*", config.team_name);
    let _ = write!(text, "\n• Admins: {}", mentions(&config.admin_list()));
    let _ = write!(
        text,
        "\n• Channel format: {}",
        or_unset(config.channel_format.as_ref().map(|f| format!("`{f}`")))
    );
    let _ = write!(
        text,
        "\n• Announcement channel: {}",
        or_unset(config.announcement_channel.as_deref().map(channel_link))
    );
    let _ = write!(text, "\n• Announcement tag: @{}", config.announcement_tag);
    let _ = write!(
        text,
        "\n• Announcement text: {}",
        if config.custom_announcement_text.is_empty() {
            "_default_".to_owned()
        } else {
            format!("\"{}\"", config.custom_announcement_text)
        }
    );
    let _ = write!(
        text,
        "\n• Auto-add active users: {}",
        if config.auto_add_active_users { "on" } else { "off" }
    );
    let _ = write!(
        text,
        "\n• Always included: {}",
        if always.is_empty() { "_nobody_".to_owned() } else { mentions(&always) }
    );
    let _ = write!(
        text,
        "\n• Kept apart: {}",
        if pairs.is_empty() { "_nobody_".to_owned() } else { pairs.join(", ") }
    );
    text
}

/// Run a command that reads or changes workspace settings.
///
/// # Errors
///
/// Returns `AppError::Validation` for bad arguments or the store/gateway
/// error.
pub async fn run(dm: &DirectMessage<'_>, config: &WorkspaceConfig, command: Command) -> Result<String> {
    let team = dm.team_id;
    match command {
        Command::KingMe => {
            let code = dm.repo.generate_admin_passcode(team, dm.user_id).await?;
            // The server log is the out-of-band delivery channel for the code.
            warn!(team_id = team, user_id = dm.user_id, passcode = %code, "admin passcode issued");
            Ok(format!(
                "I've generated an admin passcode. Ask whoever runs the bot for the code from \
                 the server log and send it to me here. It expires in {} minutes.",
                dm.passcode_ttl.num_minutes()
            ))
        }
        Command::Passcode(code) => {
            if dm
                .repo
                .verify_admin_passcode(team, dm.user_id, &code, dm.passcode_ttl)
                .await?
            {
                dm.repo.add_admin(team, dm.user_id).await?;
                info!(team_id = team, user_id = dm.user_id, "admin added by passcode");
                Ok("You're now a check-in admin. Send me `help` to see the admin commands.".into())
            } else {
                Err(AppError::Validation(
                    "that passcode is invalid or expired; send `king me` for a new one".into(),
                ))
            }
        }
        Command::KeepApart(a, b) => {
            let added = dm.repo.add_incompatible_pair(team, &a, &b).await?;
            Ok(if added {
                format!("Got it. I'll keep {} and {} in different groups.", mention(&a), mention(&b))
            } else {
                format!("{} and {} were already kept apart.", mention(&a), mention(&b))
            })
        }
        Command::StopKeepingApart(a, b) => {
            let removed = dm.repo.remove_incompatible_pair(team, &a, &b).await?;
            Ok(if removed {
                format!("{} and {} may now share a group.", mention(&a), mention(&b))
            } else {
                format!("{} and {} weren't being kept apart.", mention(&a), mention(&b))
            })
        }
        Command::AlwaysInclude(users) => {
            let added = dm.repo.add_always_include_users(team, &users).await?;
            Ok(if added.is_empty() {
                "Everyone you mentioned is already always included.".into()
            } else {
                format!("{} will be added to every month's groups.", mentions(&added))
            })
        }
        Command::RemoveAlwaysInclude(users) => {
            let removed = dm.repo.remove_always_include_users(team, &users).await?;
            Ok(if removed.is_empty() {
                "None of those people were on the always-include list.".into()
            } else {
                format!("{} will only join groups they sign up for.", mentions(&removed))
            })
        }
        Command::SetChannelFormat(raw) => {
            let format = dm.repo.update_channel_format(team, &raw).await?;
            let (year, month) = next_month(dm.today);
            let examples = format.channel_names(year, month, 2);
            Ok(format!(
                "Channel format set to `{}`. Next month's channels will be named like `{}`.",
                format.as_str(),
                examples.join("`, `")
            ))
        }
        Command::SetAnnouncementChannel(channel) => {
            let channel_id = resolve_channel(dm.gateway, &channel).await?;
            dm.repo.update_announcement_channel(team, &channel_id).await?;
            Ok(format!(
                "Signup announcements will be posted in {}. Make sure I'm a member there.",
                channel_link(&channel_id)
            ))
        }
        Command::SetAnnouncementLink(url) => {
            let announcement = AnnouncementRef::from_permalink(&url)?;
            let channel = announcement.channel.clone();
            dm.repo.update_last_announcement(team, announcement).await?;
            Ok(format!(
                "I'll read signups from that message in {}.",
                channel_link(&channel)
            ))
        }
        Command::SetAnnouncementTag(raw) => {
            let tag: AnnouncementTag = raw.parse()?;
            dm.repo.update_announcement_tag(team, tag).await?;
            Ok(format!("Announcements will mention @{tag}."))
        }
        Command::SetAnnouncementText(text) => {
            dm.repo.update_announcement_text(team, &text).await?;
            Ok(if text.trim().is_empty() {
                "Announcements will use the default text.".into()
            } else {
                "Announcement text updated.".into()
            })
        }
        Command::SetAutoAdd(enabled) => {
            dm.repo.update_auto_add_setting(team, enabled).await?;
            Ok(if enabled {
                "People who posted in this month's groups recently will be added to next month's \
                 groups automatically."
                    .into()
            } else {
                "Only people who react to the announcement will be grouped.".into()
            })
        }
        Command::ShowSettings => Ok(settings_text(config)),
        Command::Help | Command::Export(_) => Err(AppError::Validation(
            "that isn't a settings command".into(),
        )),
    }
}
