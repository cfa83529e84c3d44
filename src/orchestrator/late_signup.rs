//! Absorbing reactions that arrive after the groups were formed.
//!
//! Runs on the first days of the month: anyone who reacted to the
//! announcement but is not in any of this month's group channels joins the
//! least-populated channel that holds none of their incompatible users.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::config::LifecycleConfig;
use crate::models::channel_format::ChannelFormat;
use crate::models::participation::ReactionSet;
use crate::slack::gateway::{ChatGateway, OutgoingMessage};
use crate::Result;

use super::channels::{fetch_month_channels, GroupChannel};
use super::context::WorkspaceContext;
use super::messages;
use super::notify::notify_admins;

/// What happened to late reactors in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LateSignupReport {
    /// Channel id → users added there.
    pub placed: BTreeMap<String, Vec<String>>,
    /// Users every channel conflicts with.
    pub unplaceable: Vec<String>,
    /// Human-readable failure lines.
    pub failures: Vec<String>,
}

impl LateSignupReport {
    /// Whether the run changed or attempted nothing worth reporting.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.placed.is_empty() && self.unplaceable.is_empty() && self.failures.is_empty()
    }
}

struct Candidate {
    channel: GroupChannel,
    members: BTreeSet<String>,
}

/// Least-populated channel without any of `user`'s counterparts; ties go
/// to the lowest group number.
fn choose_channel(candidates: &[Candidate], counterparts: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| {
            !counterparts
                .iter()
                .any(|other| candidate.members.contains(*other))
        })
        .min_by_key(|(idx, candidate)| (candidate.members.len(), candidate.channel.number, *idx))
        .map(|(idx, _)| idx)
}

fn report_text(report: &LateSignupReport) -> String {
    let mut text = String::from("Late signups:");
    for (channel_id, users) in &report.placed {
        text.push_str(&format!(
            "\n• added {} to {}",
            messages::mentions(users),
            messages::channel_link(channel_id)
        ));
    }
    if !report.unplaceable.is_empty() {
        text.push_str(&format!(
            "\n• couldn't place {}: every group contains someone they must be kept apart from",
            messages::mentions(&report.unplaceable)
        ));
    }
    for failure in &report.failures {
        text.push_str(&format!("\n• {failure}"));
    }
    text
}

/// Add late reactors to this month's group channels.
///
/// # Errors
///
/// Returns a gateway error when channels, members, or reactions cannot be
/// read. Per-user invite failures are reported, not returned.
pub async fn absorb_late_signups(
    gateway: &dyn ChatGateway,
    settings: &LifecycleConfig,
    ctx: &WorkspaceContext,
    today: NaiveDate,
) -> Result<LateSignupReport> {
    let mut report = LateSignupReport::default();
    let (Some(announcement), Some(raw_format)) = (
        ctx.config.last_announcement.as_ref(),
        ctx.config.channel_format.as_deref(),
    ) else {
        info!(team_id = %ctx.team_id, "no announcement or format; skipping late signups");
        return Ok(report);
    };
    let format = ChannelFormat::parse(raw_format)?;

    let channels = fetch_month_channels(gateway, &format, today.year(), today.month()).await?;
    if channels.is_empty() {
        info!(team_id = %ctx.team_id, "no group channels this month; skipping late signups");
        return Ok(report);
    }

    let mut candidates = Vec::with_capacity(channels.len());
    for channel in channels {
        let members: BTreeSet<String> = gateway
            .channel_members(&channel.channel.id)
            .await?
            .into_iter()
            .collect();
        candidates.push(Candidate { channel, members });
    }

    let reactions = gateway
        .reactions(&announcement.channel, &announcement.ts)
        .await?;
    let reactors = ReactionSet::from_reactions(
        &reactions,
        &settings.daily_reaction,
        &settings.weekly_reaction,
    )
    .all_users();
    let exempt = ctx.exempt_users();
    let late: Vec<String> = reactors
        .into_iter()
        .filter(|user| !exempt.contains(user))
        .filter(|user| !candidates.iter().any(|c| c.members.contains(user)))
        .collect();

    if late.is_empty() {
        info!(team_id = %ctx.team_id, "no late signups");
        return Ok(report);
    }

    for user in late {
        let counterparts = ctx.config.counterparts(&user);
        let Some(idx) = choose_channel(&candidates, &counterparts) else {
            warn!(user_id = %user, "late signup conflicts with every group");
            report.unplaceable.push(user);
            continue;
        };

        let channel_id = candidates[idx].channel.channel.id.clone();
        match gateway.invite(&channel_id, &user).await {
            Ok(()) => {
                info!(channel_id = %channel_id, user_id = %user, "late signup placed");
                candidates[idx].members.insert(user.clone());
                report.placed.entry(channel_id).or_default().push(user);
            }
            Err(err) => {
                warn!(channel_id = %channel_id, user_id = %user, %err, "late signup invite failed");
                report.failures.push(format!(
                    "inviting {} to {}: {err}",
                    messages::mention(&user),
                    messages::channel_link(&channel_id)
                ));
            }
        }
    }

    for (channel_id, users) in &report.placed {
        let message = OutgoingMessage::new(channel_id.clone(), messages::late_welcome(users));
        if let Err(err) = gateway.post_message(message).await {
            warn!(channel_id = %channel_id, %err, "late welcome failed");
            report
                .failures
                .push(format!("welcoming late signups in {}: {err}", messages::channel_link(channel_id)));
        }
    }

    if !report.is_quiet() {
        notify_admins(gateway, ctx, &report_text(&report)).await;
    }
    Ok(report)
}
