//! Day-25 signup announcement.

use chrono::{FixedOffset, NaiveDate};
use tracing::{info, warn};

use crate::config::LifecycleConfig;
use crate::models::message::ts_to_datetime;
use crate::models::workspace::AnnouncementRef;
use crate::persistence::workspace_repo::WorkspaceRepo;
use crate::slack::gateway::{ChatGateway, OutgoingMessage};
use crate::{AppError, Result};

use super::calendar::{month_name, next_month, reference_date};
use super::context::WorkspaceContext;
use super::messages;
use super::notify::notify_admins;

/// Outcome of the announcement step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementOutcome {
    /// Posted and recorded as the workspace's last announcement.
    Posted(AnnouncementRef),
    /// An announcement was already posted on this date.
    AlreadyPosted,
}

/// Post next month's signup announcement and record it.
///
/// # Errors
///
/// Returns `AppError::Config` when no announcement channel is set (admins
/// are told), or the gateway/store error if posting or saving fails.
pub async fn post_announcement(
    gateway: &dyn ChatGateway,
    repo: &WorkspaceRepo,
    settings: &LifecycleConfig,
    ctx: &WorkspaceContext,
    today: NaiveDate,
    offset: FixedOffset,
) -> Result<AnnouncementOutcome> {
    let Some(channel) = ctx.config.announcement_channel.as_deref() else {
        notify_admins(
            gateway,
            ctx,
            "I couldn't post this month's check-in signup announcement because no \
             announcement channel is set. Send me `set announcement channel #channel`.",
        )
        .await;
        return Err(AppError::Config("announcement channel is not set".into()));
    };

    if let Some(previous) = &ctx.config.last_announcement {
        let posted_today = ts_to_datetime(&previous.ts)
            .is_some_and(|posted| reference_date(posted, offset) == today);
        if posted_today {
            info!(team_id = %ctx.team_id, "announcement already posted today");
            return Ok(AnnouncementOutcome::AlreadyPosted);
        }
    }

    let (year, month) = next_month(today);
    let text = messages::announcement(
        ctx.config.announcement_tag.mention(),
        &ctx.config.custom_announcement_text,
        year,
        month,
        &settings.daily_reaction,
        &settings.weekly_reaction,
    );
    let ts = gateway
        .post_message(OutgoingMessage::new(channel, text))
        .await?;

    for reaction in [&settings.daily_reaction, &settings.weekly_reaction] {
        if let Err(err) = gateway.add_reaction(channel, &ts, reaction).await {
            warn!(team_id = %ctx.team_id, reaction, %err, "failed to seed announcement reaction");
        }
    }

    let announcement = AnnouncementRef {
        channel: channel.to_owned(),
        ts,
    };
    repo.update_last_announcement(&ctx.team_id, announcement.clone())
        .await?;
    info!(team_id = %ctx.team_id, channel_id = channel, ts = %announcement.ts, "announcement posted");

    notify_admins(
        gateway,
        ctx,
        &format!(
            "Posted the {} {year} check-in signup announcement in {}.",
            month_name(month),
            messages::channel_link(channel)
        ),
    )
    .await;

    Ok(AnnouncementOutcome::Posted(announcement))
}
