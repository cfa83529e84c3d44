#![forbid(unsafe_code)]

//! `checkin-bot`: Slack check-in group bot binary.
//!
//! `serve` runs Socket Mode, the OAuth/health HTTP server, and the hourly
//! lifecycle scheduler. `run-lifecycle` is a one-shot batch run for cron.
//! `diagnose` checks a workspace's Slack permissions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use checkin_bot::config::GlobalConfig;
use checkin_bot::diagnostics::{report_result, run_diagnostics, DiagnosticOptions};
use checkin_bot::llm::client::OpenAiEmojiClient;
use checkin_bot::llm::EmojiSuggester;
use checkin_bot::orchestrator::calendar::{reference_date, reference_offset};
use checkin_bot::orchestrator::lifecycle::run_all_workspaces;
use checkin_bot::orchestrator::scheduler;
use checkin_bot::persistence::db;
use checkin_bot::slack::client::SlackService;
use checkin_bot::slack::oauth;
use checkin_bot::state::AppState;
use checkin_bot::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "checkin-bot", about = "Slack check-in group bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bot: Socket Mode events, HTTP server, and scheduler.
    Serve,
    /// Run the lifecycle steps due on a date once, then exit.
    RunLifecycle {
        /// Reference date (YYYY-MM-DD); defaults to today in the reference timezone.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Restrict the run to these team ids.
        #[arg(long = "team")]
        teams: Vec<String>,
    },
    /// Check Slack permissions for one workspace.
    Diagnose {
        /// Team id to check.
        #[arg(long)]
        team: String,
        /// User to send a test DM to.
        #[arg(long)]
        dm_user: Option<String>,
        /// Create and archive a throwaway private channel.
        #[arg(long)]
        check_channels: bool,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("checkin-bot bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn build_state(config_path: &Path) -> Result<Arc<AppState>> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(config_path)?;
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.database_path).await?);
    info!(path = %config.database_path.display(), "database connected");

    let slack = Arc::new(SlackService::new(&config.http)?);
    let emoji: Option<Arc<dyn EmojiSuggester>> =
        match OpenAiEmojiClient::from_config(&config.llm, &config.http)? {
            Some(client) => Some(Arc::new(client)),
            None => None,
        };

    Ok(Arc::new(AppState::new(config, db, slack, emoji)))
}

async fn run(args: Cli) -> Result<()> {
    let state = build_state(&args.config).await?;
    match args.command {
        Command::Serve => serve(state).await,
        Command::RunLifecycle { date, teams } => run_once(&state, date, &teams).await,
        Command::Diagnose {
            team,
            dm_user,
            check_channels,
        } => {
            let gateway = state.gateway_for(&team).await?;
            let options = DiagnosticOptions {
                dm_user,
                check_channels,
            };
            let report = run_diagnostics(&gateway, &options, Utc::now()).await;
            report_result(&report)
        }
    }
}

async fn run_once(state: &AppState, date: Option<NaiveDate>, teams: &[String]) -> Result<()> {
    let date = match date {
        Some(date) => date,
        None => {
            let offset = reference_offset(state.config.lifecycle.utc_offset_hours)?;
            reference_date(Utc::now(), offset)
        }
    };

    let runs = run_all_workspaces(state, date, teams).await?;
    let mut failed = 0;
    for (team_id, run) in &runs {
        match run {
            Ok(run) if run.is_clean() => {
                info!(team_id = %team_id, steps = run.steps.len(), "workspace run clean");
            }
            Ok(run) => {
                failed += 1;
                warn!(team_id = %team_id, steps = run.steps.len(), "workspace run had failing steps");
            }
            Err(err) => {
                failed += 1;
                error!(team_id = %team_id, %err, "workspace run failed");
            }
        }
    }

    if failed > 0 {
        return Err(AppError::Slack(format!(
            "{failed} of {} workspace run(s) did not complete cleanly",
            runs.len()
        )));
    }
    Ok(())
}

async fn serve(state: Arc<AppState>) -> Result<()> {
    let ct = CancellationToken::new();

    // ── Start scheduler ─────────────────────────────────
    let scheduler_handle = scheduler::spawn_scheduler(Arc::clone(&state), ct.clone())?;
    info!("lifecycle scheduler started");

    // ── Start Slack Socket Mode ─────────────────────────
    let socket_handle = state
        .slack
        .spawn_socket_mode(&state.config.slack.app_token, Arc::clone(&state));
    info!("slack socket mode started");

    // ── Start HTTP server ───────────────────────────────
    let http_ct = ct.clone();
    let http_state = Arc::clone(&state);
    let http_handle = tokio::spawn(async move {
        if let Err(err) = oauth::serve_http(http_state, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!("checkin-bot ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();
    socket_handle.abort();

    let _ = tokio::join!(scheduler_handle, http_handle);
    info!("checkin-bot shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
