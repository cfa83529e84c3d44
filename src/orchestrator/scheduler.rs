//! Hourly background trigger for the daily lifecycle run.
//!
//! Each tick converts "now" to the reference timezone. Once the local hour
//! reaches `run_hour`, the date is run for every workspace and recorded in
//! the run log so a restart never repeats it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::AppState;
use crate::Result;

use super::calendar::{reference_date, reference_hour, reference_offset};
use super::lifecycle::run_all_workspaces;

const TICK_INTERVAL: Duration = Duration::from_secs(3600);

/// Reference date that should run at `now`, if any.
///
/// A date is due once its local hour reaches `run_hour` and it is later
/// than the last recorded run.
#[must_use]
pub fn due_date(
    now: DateTime<Utc>,
    offset: FixedOffset,
    run_hour: u32,
    last_run: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let today = reference_date(now, offset);
    if reference_hour(now, offset) < run_hour {
        return None;
    }
    match last_run {
        Some(last) if last >= today => None,
        _ => Some(today),
    }
}

/// Spawn the scheduler background task.
///
/// Ticks immediately, then hourly, until `cancel` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the configured UTC offset is invalid.
pub fn spawn_scheduler(state: Arc<AppState>, cancel: CancellationToken) -> Result<JoinHandle<()>> {
    let offset = reference_offset(state.config.lifecycle.utc_offset_hours)?;
    let run_hour = state.config.lifecycle.run_hour;

    Ok(tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("lifecycle scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = tick(&state, offset, run_hour).await {
                        error!(%err, "scheduled lifecycle tick failed");
                    }
                }
            }
        }
    }))
}

async fn tick(state: &AppState, offset: FixedOffset, run_hour: u32) -> Result<()> {
    let last_run = state.run_log.last_run_date().await?;
    let Some(date) = due_date(Utc::now(), offset, run_hour, last_run) else {
        return Ok(());
    };

    info!(%date, "scheduled lifecycle run starting");
    let runs = run_all_workspaces(state, date, &[]).await?;
    let failed = runs.iter().filter(|(_, run)| run.is_err()).count();
    if failed > 0 {
        warn!(%date, failed, total = runs.len(), "some workspaces failed their lifecycle run");
    }
    state.run_log.record(date).await?;
    info!(%date, workspaces = runs.len(), "scheduled lifecycle run finished");
    Ok(())
}
