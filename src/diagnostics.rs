//! Slack permission diagnostics for one workspace.
//!
//! Runs a fixed sequence of read and (optionally) write calls, logs each
//! result, and flags `restricted_action` refusals that point at workspace
//! channel-management settings.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::slack::gateway::ChatGateway;
use crate::AppError;

/// Outcome of one diagnostic call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Slack method or step exercised.
    pub name: &'static str,
    /// Detail on success, error text on failure.
    pub outcome: std::result::Result<String, String>,
    /// Whether Slack refused with `restricted_action`.
    pub restricted: bool,
}

impl Check {
    fn from_result(name: &'static str, result: crate::Result<String>) -> Self {
        match result {
            Ok(detail) => {
                info!(check = name, %detail, "diagnostic passed");
                Self {
                    name,
                    outcome: Ok(detail),
                    restricted: false,
                }
            }
            Err(err) => {
                let restricted = err.is_restricted_action();
                if restricted {
                    error!(
                        check = name,
                        %err,
                        "restricted action: the workspace limits who may manage channels"
                    );
                } else {
                    error!(check = name, %err, "diagnostic failed");
                }
                Self {
                    name,
                    outcome: Err(err.to_string()),
                    restricted,
                }
            }
        }
    }
}

/// Every check run against a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    /// Checks in execution order.
    pub checks: Vec<Check>,
}

impl DiagnosticReport {
    /// Number of failed checks.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| c.outcome.is_err()).count()
    }

    /// Whether any check hit `restricted_action`.
    #[must_use]
    pub fn has_restricted_actions(&self) -> bool {
        self.checks.iter().any(|c| c.restricted)
    }
}

/// Options for [`run_diagnostics`].
#[derive(Debug, Clone, Default)]
pub struct DiagnosticOptions {
    /// User to DM a test message to.
    pub dm_user: Option<String>,
    /// Create, invite into, and archive a throwaway private channel.
    pub check_channels: bool,
}

/// Run the diagnostic sequence.
pub async fn run_diagnostics(
    gateway: &dyn ChatGateway,
    options: &DiagnosticOptions,
    now: DateTime<Utc>,
) -> DiagnosticReport {
    info!("running slack api diagnostics");
    let mut report = DiagnosticReport::default();

    let bot = gateway.bot_user_id().await;
    let bot_id = bot.as_ref().ok().cloned();
    report
        .checks
        .push(Check::from_result("auth.test", bot.map(|id| format!("bot user {id}"))));

    report.checks.push(Check::from_result(
        "team.info",
        gateway.team_name().await.map(|name| format!("workspace {name}")),
    ));

    report.checks.push(Check::from_result(
        "conversations.list",
        gateway.list_channels().await.map(|channels| {
            let private = channels.iter().filter(|c| c.is_private).count();
            format!("{} channels visible ({private} private)", channels.len())
        }),
    ));

    if let Some(bot_id) = &bot_id {
        report.checks.push(Check::from_result(
            "users.info",
            gateway
                .user_display_name(bot_id)
                .await
                .map(|name| format!("bot display name {name}")),
        ));
    }

    if let Some(user) = &options.dm_user {
        report.checks.push(Check::from_result(
            "chat.postMessage (dm)",
            gateway
                .send_dm(user, "Check-in Bot diagnostic test message.")
                .await
                .map(|()| format!("sent to {user}")),
        ));
    }

    if options.check_channels {
        try_channel_lifecycle(gateway, options.dm_user.as_deref(), now, &mut report).await;
    }

    if report.has_restricted_actions() {
        warn!(
            "restricted_action errors usually mean only workspace admins may create or \
             manage channels; ask an admin to relax the channel-management settings"
        );
    }
    info!(failures = report.failures(), "slack api diagnostics complete");
    report
}

async fn try_channel_lifecycle(
    gateway: &dyn ChatGateway,
    invitee: Option<&str>,
    now: DateTime<Utc>,
    report: &mut DiagnosticReport,
) {
    let name = format!("test-diag-priv-{}", now.timestamp());
    let created = gateway.create_channel(&name, true).await;
    let channel = created.as_ref().ok().cloned();
    report.checks.push(Check::from_result(
        "conversations.create",
        created.map(|c| format!("created #{} ({})", c.name, c.id)),
    ));
    let Some(channel) = channel else {
        return;
    };

    if let Some(user) = invitee {
        report.checks.push(Check::from_result(
            "conversations.invite",
            gateway
                .invite(&channel.id, user)
                .await
                .map(|()| format!("invited {user}")),
        ));
    }

    report.checks.push(Check::from_result(
        "conversations.archive",
        gateway
            .archive(&channel.id)
            .await
            .map(|()| format!("archived #{}", channel.name)),
    ));
}

/// Map a report to a process result for the CLI.
///
/// # Errors
///
/// Returns `AppError::Slack` summarizing the failures.
pub fn report_result(report: &DiagnosticReport) -> crate::Result<()> {
    match report.failures() {
        0 => Ok(()),
        n => Err(AppError::Slack(format!("{n} diagnostic check(s) failed"))),
    }
}
