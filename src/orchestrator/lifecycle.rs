//! Daily lifecycle dispatch for one or many workspaces.
//!
//! [`Lifecycle::run`] decides which steps are due on a reference date and
//! runs them sequentially for one workspace. A failed step is logged and
//! reported to admins; later steps still run. [`run_all_workspaces`] fans
//! the same date out to every known workspace concurrently.

use std::collections::BTreeSet;

use chrono::{FixedOffset, NaiveDate};
use futures_util::future::join_all;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::LifecycleConfig;
use crate::models::workspace::WorkspaceConfig;
use crate::persistence::workspace_repo::WorkspaceRepo;
use crate::slack::gateway::ChatGateway;
use crate::state::AppState;
use crate::{AppError, Result};

use super::announcement::{post_announcement, AnnouncementOutcome};
use super::calendar::{reference_offset, steps_for, LifecycleStep};
use super::context::{load_workspace, WorkspaceContext};
use super::group_creation::{create_groups, GroupCreationOutcome};
use super::late_signup::{absorb_late_signups, LateSignupReport};
use super::membership_review::{remove_inactive, send_reminders, ReviewReport};
use super::notify::notify_admins;

/// What a single step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Day 25.
    Announcement(AnnouncementOutcome),
    /// Last day of the month.
    Groups(GroupCreationOutcome),
    /// Days 1 and 2.
    LateSignups(LateSignupReport),
    /// Day 7.
    Reminders(ReviewReport),
    /// Day 11.
    Removals(ReviewReport),
}

/// Every step attempted for one workspace on one date.
#[derive(Debug)]
pub struct WorkspaceRun {
    /// Slack team id.
    pub team_id: String,
    /// Reference date the run was evaluated for.
    pub date: NaiveDate,
    /// Steps in execution order with their results.
    pub steps: Vec<(LifecycleStep, Result<StepOutcome>)>,
}

impl WorkspaceRun {
    /// Whether every attempted step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|(_, result)| result.is_ok())
    }
}

/// Lifecycle runner bound to one workspace's gateway.
pub struct Lifecycle<'a> {
    gateway: &'a dyn ChatGateway,
    repo: &'a WorkspaceRepo,
    settings: &'a LifecycleConfig,
    offset: FixedOffset,
}

impl<'a> Lifecycle<'a> {
    /// Bind the runner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the configured UTC offset is invalid.
    pub fn new(
        gateway: &'a dyn ChatGateway,
        repo: &'a WorkspaceRepo,
        settings: &'a LifecycleConfig,
    ) -> Result<Self> {
        Ok(Self {
            gateway,
            repo,
            settings,
            offset: reference_offset(settings.utc_offset_hours)?,
        })
    }

    /// Run every step due on `date` for `team_id`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the workspace record or bot identity
    /// cannot be loaded; step failures are collected in the returned run.
    pub async fn run(&self, team_id: &str, date: NaiveDate) -> Result<WorkspaceRun> {
        let mut run = WorkspaceRun {
            team_id: team_id.to_owned(),
            date,
            steps: Vec::new(),
        };
        let due = steps_for(date);
        if due.is_empty() {
            info!(team_id, %date, "no lifecycle steps due");
            return Ok(run);
        }

        let config = load_workspace(self.gateway, self.repo, team_id).await?;
        let bot_user_id = match self.gateway.bot_user_id().await {
            Ok(id) => id,
            Err(err) => return Err(self.abort(&config, err).await),
        };

        for step in due {
            // Each step sees the settings the previous one wrote.
            let config = match self.repo.get(team_id).await {
                Ok(latest) => latest.unwrap_or_else(|| config.clone()),
                Err(err) => return Err(self.abort(&config, err).await),
            };
            let ctx = WorkspaceContext::new(config, bot_user_id.clone());
            let span = info_span!("lifecycle_step", team_id, step = %step, %date);
            let result = self.run_step(step, &ctx, date).instrument(span).await;

            match &result {
                Ok(_) => info!(team_id, step = %step, "lifecycle step finished"),
                Err(AppError::Config(reason)) => {
                    warn!(team_id, step = %step, %reason, "lifecycle step skipped");
                }
                Err(err) => {
                    error!(team_id, step = %step, %err, "lifecycle step failed");
                    notify_admins(
                        self.gateway,
                        &ctx,
                        &format!("The {step} step failed: {err}"),
                    )
                    .await;
                }
            }
            run.steps.push((step, result));
        }
        Ok(run)
    }

    /// Tell the admins in `config` that the run stopped, then hand `err` back.
    async fn abort(&self, config: &WorkspaceConfig, err: AppError) -> AppError {
        error!(team_id = %config.team_id, %err, "lifecycle run aborted");
        let ctx = WorkspaceContext::new(config.clone(), String::new());
        notify_admins(
            self.gateway,
            &ctx,
            &format!("Today's check-in run stopped early: {err}"),
        )
        .await;
        err
    }

    /// Run a single step regardless of the date's schedule.
    ///
    /// # Errors
    ///
    /// Propagates the step's own error.
    pub async fn run_step(
        &self,
        step: LifecycleStep,
        ctx: &WorkspaceContext,
        date: NaiveDate,
    ) -> Result<StepOutcome> {
        match step {
            LifecycleStep::Announce => post_announcement(
                self.gateway,
                self.repo,
                self.settings,
                ctx,
                date,
                self.offset,
            )
            .await
            .map(StepOutcome::Announcement),
            LifecycleStep::CreateGroups => {
                create_groups(self.gateway, self.settings, ctx, date, self.offset)
                    .await
                    .map(StepOutcome::Groups)
            }
            LifecycleStep::AbsorbLateSignups => {
                absorb_late_signups(self.gateway, self.settings, ctx, date)
                    .await
                    .map(StepOutcome::LateSignups)
            }
            LifecycleStep::RemindInactive => send_reminders(self.gateway, ctx, date)
                .await
                .map(StepOutcome::Reminders),
            LifecycleStep::RemoveInactive => remove_inactive(self.gateway, ctx, date)
                .await
                .map(StepOutcome::Removals),
        }
    }
}

/// `only` when given, else every team with a stored record or an installation.
async fn known_teams(state: &AppState, only: &[String]) -> Result<BTreeSet<String>> {
    if !only.is_empty() {
        return Ok(only.iter().cloned().collect());
    }
    let mut teams: BTreeSet<String> = state
        .workspaces
        .get_all()
        .await?
        .into_iter()
        .map(|config| config.team_id)
        .collect();
    teams.extend(
        state
            .installations
            .list()
            .await?
            .into_iter()
            .map(|installation| installation.team_id),
    );
    Ok(teams)
}

async fn run_workspace(
    state: &AppState,
    team_id: String,
    date: NaiveDate,
) -> (String, Result<WorkspaceRun>) {
    let result = async {
        let gateway = state.gateway_for(&team_id).await?;
        let lifecycle = Lifecycle::new(&gateway, &state.workspaces, &state.config.lifecycle)?;
        lifecycle.run(&team_id, date).await
    }
    .instrument(info_span!("workspace_run", team_id = %team_id, %date))
    .await;

    if let Err(err) = &result {
        error!(team_id = %team_id, %err, "workspace lifecycle run failed");
    }
    (team_id, result)
}

/// Run `date`'s lifecycle for every known workspace concurrently.
///
/// When `only` is non-empty, just those team ids run. One workspace's
/// failure never stops the others.
///
/// # Errors
///
/// Returns `AppError::Db` if the workspace list cannot be read.
pub async fn run_all_workspaces(
    state: &AppState,
    date: NaiveDate,
    only: &[String],
) -> Result<Vec<(String, Result<WorkspaceRun>)>> {
    let teams = known_teams(state, only).await?;
    if teams.is_empty() {
        warn!("no workspaces known; nothing to run");
        return Ok(Vec::new());
    }
    info!(workspaces = teams.len(), %date, "starting lifecycle run");

    let runs = join_all(
        teams
            .into_iter()
            .map(|team_id| run_workspace(state, team_id, date)),
    )
    .await;
    Ok(runs)
}
