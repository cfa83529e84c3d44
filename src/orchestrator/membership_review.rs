//! Mid-month participation review: reminders on day 7, removals on day 11.

use chrono::{Datelike, NaiveDate};
use tracing::{info, info_span, warn, Instrument};

use crate::grouping::classifier::{self, Classification};
use crate::models::channel_format::ChannelFormat;
use crate::slack::gateway::ChatGateway;
use crate::Result;

use super::channels::fetch_month_channels;
use super::context::WorkspaceContext;
use super::messages;
use super::notify::notify_admins;

/// Per-channel counts from a review run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewReport {
    /// Channels examined.
    pub channels: usize,
    /// Users reminded (day 7) or removed (day 11).
    pub acted_on: Vec<String>,
    /// Human-readable failure lines.
    pub failures: Vec<String>,
}

/// Classify one channel's members, treating any fetch failure as "no data".
pub async fn classify_channel(
    gateway: &dyn ChatGateway,
    ctx: &WorkspaceContext,
    channel_id: &str,
) -> Classification {
    let fetched = async {
        let members = gateway.channel_members(channel_id).await?;
        let mut history = gateway.channel_history(channel_id, None).await?;
        if let Some(welcome_ts) = classifier::find_welcome(&history).map(|m| m.ts.clone()) {
            history.extend(gateway.thread_replies(channel_id, &welcome_ts).await?);
        }
        Result::Ok((members, history))
    }
    .await;

    match fetched {
        Ok((members, history)) => {
            classifier::classify(&members, &history).without(&ctx.exempt_users())
        }
        Err(err) => {
            warn!(channel_id, %err, "classification skipped; channel data unavailable");
            Classification::default()
        }
    }
}

async fn current_channels(
    gateway: &dyn ChatGateway,
    ctx: &WorkspaceContext,
    today: NaiveDate,
) -> Result<Vec<String>> {
    let Some(raw) = ctx.config.channel_format.as_deref() else {
        info!(team_id = %ctx.team_id, "no channel format; nothing to review");
        return Ok(Vec::new());
    };
    let format = ChannelFormat::parse(raw)?;
    let channels = fetch_month_channels(gateway, &format, today.year(), today.month()).await?;
    Ok(channels.into_iter().map(|group| group.channel.id).collect())
}

/// DM every `no_post` and `intro_only` member of this month's channels.
///
/// # Errors
///
/// Returns a gateway error only if this month's channels cannot be listed.
pub async fn send_reminders(
    gateway: &dyn ChatGateway,
    ctx: &WorkspaceContext,
    today: NaiveDate,
) -> Result<ReviewReport> {
    let mut report = ReviewReport::default();
    for channel_id in current_channels(gateway, ctx, today).await? {
        report.channels += 1;
        let span = info_span!("remind_channel", channel_id = %channel_id);
        let classification = classify_channel(gateway, ctx, &channel_id)
            .instrument(span)
            .await;

        let reminders = classification
            .no_post
            .iter()
            .map(|user| (user, messages::no_post_reminder(&channel_id)))
            .chain(
                classification
                    .intro_only
                    .iter()
                    .map(|user| (user, messages::intro_only_reminder(&channel_id))),
            );
        for (user, text) in reminders {
            match gateway.send_dm(user, &text).await {
                Ok(()) => report.acted_on.push(user.clone()),
                Err(err) => {
                    warn!(channel_id = %channel_id, user_id = %user, %err, "reminder failed");
                    report
                        .failures
                        .push(format!("reminding {}: {err}", messages::mention(user)));
                }
            }
        }
    }

    info!(team_id = %ctx.team_id, reminded = report.acted_on.len(), "reminders sent");
    if !report.acted_on.is_empty() || !report.failures.is_empty() {
        let mut text = format!(
            "Sent check-in reminders to {} member(s) across {} group(s).",
            report.acted_on.len(),
            report.channels
        );
        for failure in &report.failures {
            text.push_str(&format!("\n• {failure}"));
        }
        notify_admins(gateway, ctx, &text).await;
    }
    Ok(report)
}

/// Remove every `no_post` member of this month's channels and tell them why.
///
/// # Errors
///
/// Returns a gateway error only if this month's channels cannot be listed.
pub async fn remove_inactive(
    gateway: &dyn ChatGateway,
    ctx: &WorkspaceContext,
    today: NaiveDate,
) -> Result<ReviewReport> {
    let mut report = ReviewReport::default();
    let mut removed_lines = Vec::new();
    for channel_id in current_channels(gateway, ctx, today).await? {
        report.channels += 1;
        let span = info_span!("review_channel", channel_id = %channel_id);
        let classification = classify_channel(gateway, ctx, &channel_id)
            .instrument(span)
            .await;

        let mut removed_here = Vec::new();
        for user in classification.no_post {
            if let Err(err) = gateway.kick(&channel_id, &user).await {
                warn!(channel_id = %channel_id, user_id = %user, %err, "removal failed");
                report.failures.push(format!(
                    "removing {} from {}: {err}",
                    messages::mention(&user),
                    messages::channel_link(&channel_id)
                ));
                continue;
            }
            info!(channel_id = %channel_id, user_id = %user, "inactive member removed");
            if let Err(err) = gateway
                .send_dm(&user, &messages::removal_notice(&channel_id))
                .await
            {
                warn!(user_id = %user, %err, "removal notice failed");
            }
            removed_here.push(user.clone());
            report.acted_on.push(user);
        }
        if !removed_here.is_empty() {
            removed_lines.push(format!(
                "• {}: {}",
                messages::channel_link(&channel_id),
                messages::mentions(&removed_here)
            ));
        }
    }

    if !report.acted_on.is_empty() || !report.failures.is_empty() {
        let mut text = format!(
            "Removed {} member(s) who never posted.",
            report.acted_on.len()
        );
        for line in &removed_lines {
            text.push('\n');
            text.push_str(line);
        }
        for failure in &report.failures {
            text.push_str(&format!("\n• {failure}"));
        }
        notify_admins(gateway, ctx, &text).await;
    }
    Ok(report)
}
