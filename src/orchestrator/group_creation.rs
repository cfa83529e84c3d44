//! Last-day-of-month group formation.
//!
//! Reads the reactions on the stored announcement, builds next month's
//! participant pool, partitions it, and creates (or reuses) one private
//! channel per group.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use tracing::{info, info_span, warn, Instrument};

use crate::config::LifecycleConfig;
use crate::grouping::classifier;
use crate::grouping::partitioner;
use crate::models::channel_format::ChannelFormat;
use crate::models::message::ChannelMessage;
use crate::models::participation::{Group, ParticipantPool, ReactionSet};
use crate::models::workspace::AnnouncementRef;
use crate::slack::gateway::{ChatGateway, OutgoingMessage};
use crate::{AppError, Result};

use super::calendar::{month_name, next_month};
use super::channels::{fetch_month_channels, month_channels};
use super::context::WorkspaceContext;
use super::messages;
use super::notify::notify_admins;

/// A group channel created for next month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormedGroup {
    /// Group number.
    pub number: usize,
    /// Channel id.
    pub channel_id: String,
    /// Channel name.
    pub name: String,
    /// Participants and admin invited.
    pub members: Vec<String>,
}

/// Result of a group-creation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCreationOutcome {
    /// Nobody reacted; nothing was created.
    NoReactions,
    /// Groups were formed; `failures` lists per-channel and per-user problems.
    Formed {
        /// Groups in creation order.
        groups: Vec<FormedGroup>,
        /// Human-readable failure lines.
        failures: Vec<String>,
    },
}

struct Plan<'a> {
    announcement: &'a AnnouncementRef,
    format: ChannelFormat,
    admins: Vec<String>,
}

fn plan(ctx: &WorkspaceContext) -> Result<Plan<'_>> {
    let mut problems = Vec::new();
    let announcement = ctx.config.last_announcement.as_ref();
    if announcement.is_none() {
        problems.push("no signup announcement has been recorded".to_owned());
    }
    let format = match ctx.config.channel_format.as_deref() {
        None => {
            problems.push("no channel format is set (`set channel format <template>`)".to_owned());
            None
        }
        Some(raw) => match ChannelFormat::parse(raw) {
            Ok(format) => Some(format),
            Err(err) => {
                problems.push(format!("the stored channel format is invalid ({err})"));
                None
            }
        },
    };
    if ctx.config.admins.is_empty() {
        problems.push("the workspace has no admins".to_owned());
    }

    match (announcement, format) {
        (Some(announcement), Some(format)) if problems.is_empty() => Ok(Plan {
            announcement,
            format,
            admins: ctx.config.admin_list(),
        }),
        _ => Err(AppError::Config(problems.join("; "))),
    }
}

fn day_start(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(offset)
        .single()
        .map(|start| start.with_timezone(&Utc))
}

/// Users who posted in this month's group channels during the lookback window.
async fn recently_active(
    gateway: &dyn ChatGateway,
    format: &ChannelFormat,
    settings: &LifecycleConfig,
    today: NaiveDate,
    offset: FixedOffset,
) -> BTreeSet<String> {
    let mut active = BTreeSet::new();
    let since = day_start(today - Duration::days(i64::from(settings.auto_add_lookback_days)), offset);
    let channels = match fetch_month_channels(gateway, format, today.year(), today.month()).await {
        Ok(channels) => channels,
        Err(err) => {
            warn!(%err, "could not list channels for auto-add");
            return active;
        }
    };

    for group in channels {
        match gateway.channel_history(&group.channel.id, since).await {
            Ok(history) => active.extend(
                history
                    .into_iter()
                    .filter(ChannelMessage::is_channel_post)
                    .filter(|msg| !msg.text.starts_with(classifier::WELCOME_PREFIX))
                    .filter_map(|msg| msg.author),
            ),
            Err(err) => warn!(channel_id = %group.channel.id, %err, "history fetch failed for auto-add"),
        }
    }
    active
}

/// Build next month's pool from reactions plus optional extra users.
#[must_use]
pub fn build_pool(
    reactions: &ReactionSet,
    active_users: &BTreeSet<String>,
    always_include: &BTreeSet<String>,
    bot_user_id: &str,
) -> ParticipantPool {
    let mut pool = ParticipantPool::from_reactions(reactions);
    for user in active_users.iter().chain(always_include) {
        pool.add_weekly_if_absent(user);
    }
    pool.remove(bot_user_id);
    pool
}

fn describe_failure(what: &str, err: &AppError) -> String {
    if err.is_restricted_action() {
        format!("{what}: {err}. {}", messages::RESTRICTED_ACTION_HINT)
    } else {
        format!("{what}: {err}")
    }
}

async fn form_group(
    gateway: &dyn ChatGateway,
    group: &Group,
    name: String,
    year: i32,
    month: u32,
    failures: &mut Vec<String>,
) -> Option<FormedGroup> {
    let channel = match gateway.create_channel(&name, true).await {
        Ok(created) => created,
        Err(err) => {
            warn!(%name, %err, "channel creation failed");
            failures.push(describe_failure(&format!("creating #{name}"), &err));
            return None;
        }
    };

    let members = group.all_members();
    for user in &members {
        if let Err(err) = gateway.invite(&channel.id, user).await {
            if err.is_already_in_channel() {
                continue;
            }
            warn!(channel_id = %channel.id, user_id = %user, %err, "invite failed");
            failures.push(describe_failure(
                &format!("inviting {} to #{name}", messages::mention(user)),
                &err,
            ));
        }
    }

    let text = messages::welcome(&name, year, month, &members);
    if let Err(err) = gateway
        .post_message(OutgoingMessage::new(channel.id.clone(), text))
        .await
    {
        warn!(channel_id = %channel.id, %err, "welcome message failed");
        failures.push(format!("posting the welcome message in #{name}: {err}"));
    }

    info!(channel_id = %channel.id, %name, members = members.len(), "group formed");
    Some(FormedGroup {
        number: group.number,
        channel_id: channel.id,
        name,
        members,
    })
}

fn summary(year: i32, month: u32, groups: &[FormedGroup], failures: &[String]) -> String {
    let mut text = format!(
        "Formed {} check-in group(s) for {} {year}:",
        groups.len(),
        month_name(month)
    );
    for group in groups {
        text.push_str(&format!(
            "\n• {} ({} members)",
            messages::channel_link(&group.channel_id),
            group.members.len()
        ));
    }
    if !failures.is_empty() {
        text.push_str("\n\nSome steps failed:");
        for failure in failures {
            text.push_str(&format!("\n• {failure}"));
        }
    }
    text
}

/// Form next month's groups.
///
/// # Errors
///
/// Returns `AppError::Config` when a precondition fails (missing
/// announcement, format, or admins; groups already exist); admins are told
/// why. Gateway errors while listing channels or reading reactions abort
/// the run and are reported by the caller.
pub async fn create_groups(
    gateway: &dyn ChatGateway,
    settings: &LifecycleConfig,
    ctx: &WorkspaceContext,
    today: NaiveDate,
    offset: FixedOffset,
) -> Result<GroupCreationOutcome> {
    let (year, month) = next_month(today);
    let period = format!("{} {year}", month_name(month));

    let plan = match plan(ctx) {
        Ok(plan) => plan,
        Err(err) => {
            notify_admins(
                gateway,
                ctx,
                &format!("I couldn't create the {period} check-in groups: {err}"),
            )
            .await;
            return Err(err);
        }
    };

    let channels = gateway.list_channels().await?;
    let already = month_channels(channels, &plan.format, year, month);
    if !already.is_empty() {
        let names: Vec<String> = already.iter().map(|g| format!("#{}", g.channel.name)).collect();
        let reason = format!(
            "channels for {period} already exist ({}); not forming groups again",
            names.join(", ")
        );
        notify_admins(gateway, ctx, &format!("I skipped group creation: {reason}.")).await;
        return Err(AppError::Config(reason));
    }

    let reactions = gateway
        .reactions(&plan.announcement.channel, &plan.announcement.ts)
        .await?;
    let reactions = ReactionSet::from_reactions(
        &reactions,
        &settings.daily_reaction,
        &settings.weekly_reaction,
    );

    if reactions.is_empty() {
        info!(team_id = %ctx.team_id, "no reactions found on announcement");
        notify_admins(
            gateway,
            ctx,
            &format!("No reactions found on the {period} signup announcement, so no groups were created."),
        )
        .await;
        return Ok(GroupCreationOutcome::NoReactions);
    }

    let active = if ctx.config.auto_add_active_users {
        recently_active(gateway, &plan.format, settings, today, offset).await
    } else {
        BTreeSet::new()
    };
    let pool = build_pool(
        &reactions,
        &active,
        &ctx.config.always_include_users,
        &ctx.bot_user_id,
    );
    let groups = partitioner::partition(
        &pool,
        &ctx.config.incompatible_pairs,
        &plan.admins,
        settings.target_group_size,
    )?;
    info!(team_id = %ctx.team_id, participants = pool.len(), groups = groups.len(), "groups partitioned");

    let names = plan.format.channel_names(year, month, groups.len());

    let mut formed = Vec::new();
    let mut failures = Vec::new();
    for (group, name) in groups.iter().zip(names) {
        let span = info_span!("form_group", number = group.number, name = %name);
        if let Some(done) = form_group(gateway, group, name, year, month, &mut failures)
            .instrument(span)
            .await
        {
            formed.push(done);
        }
    }

    notify_admins(gateway, ctx, &summary(year, month, &formed, &failures)).await;
    Ok(GroupCreationOutcome::Formed {
        groups: formed,
        failures,
    })
}
