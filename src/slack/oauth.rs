//! HTTP surface: OAuth v2 install flow and health check.
//!
//! `/slack/install` redirects to Slack's consent screen with a one-time
//! `state`; `/slack/oauth_redirect` exchanges the code for a bot token and
//! stores it as the workspace's [`Installation`].

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::installation::Installation;
use crate::state::AppState;
use crate::{AppError, Result};

const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";
const ACCESS_URL: &str = "https://slack.com/api/oauth.v2.access";

/// Bot scopes requested at install time.
pub const BOT_SCOPES: &[&str] = &[
    "channels:history",
    "channels:manage",
    "channels:read",
    "chat:write",
    "files:write",
    "groups:history",
    "groups:read",
    "groups:write",
    "im:history",
    "im:read",
    "im:write",
    "reactions:read",
    "reactions:write",
    "team:read",
    "users:read",
];

#[derive(Clone)]
struct HttpState {
    app: Arc<AppState>,
    http: reqwest::Client,
    pending_states: Arc<Mutex<HashSet<String>>>,
}

#[derive(Debug, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Installation fields from an `oauth.v2.access` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthGrant {
    /// Workspace id.
    pub team_id: String,
    /// Workspace name.
    pub team_name: String,
    /// Bot token.
    pub bot_token: String,
    /// Bot user id.
    pub bot_user_id: Option<String>,
}

/// Build the consent URL for `client_id`.
///
/// # Errors
///
/// Returns `AppError::Config` if the URL cannot be built.
pub fn authorize_url(client_id: &str, redirect_url: Option<&str>, state: &str) -> Result<String> {
    let scopes = BOT_SCOPES.join(",");
    let mut params = vec![
        ("client_id", client_id),
        ("scope", scopes.as_str()),
        ("state", state),
    ];
    if let Some(redirect) = redirect_url {
        params.push(("redirect_uri", redirect));
    }
    reqwest::Url::parse_with_params(AUTHORIZE_URL, &params)
        .map(|url| url.to_string())
        .map_err(|err| AppError::Config(format!("invalid authorize url: {err}")))
}

/// Pull the installation out of an `oauth.v2.access` body.
///
/// # Errors
///
/// Returns `AppError::Slack` if Slack reported an error or a field is missing.
pub fn parse_grant(body: &Value) -> Result<OAuthGrant> {
    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let err = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
        return Err(AppError::Slack(format!("oauth.v2.access failed: {err}")));
    }
    let field = |path: &[&str]| -> Option<String> {
        let mut value = body;
        for key in path {
            value = value.get(key)?;
        }
        value.as_str().map(str::to_owned)
    };
    let missing = |name: &str| AppError::Slack(format!("oauth.v2.access response missing {name}"));

    Ok(OAuthGrant {
        team_id: field(&["team", "id"]).ok_or_else(|| missing("team.id"))?,
        team_name: field(&["team", "name"]).unwrap_or_default(),
        bot_token: field(&["access_token"]).ok_or_else(|| missing("access_token"))?,
        bot_user_id: field(&["bot_user_id"]),
    })
}

async fn health() -> &'static str {
    "ok"
}

async fn install(State(state): State<HttpState>) -> Response {
    let slack = &state.app.config.slack;
    if slack.client_id.is_empty() {
        return (StatusCode::NOT_FOUND, "OAuth installs are not configured").into_response();
    }
    let nonce = Uuid::new_v4().to_string();
    match authorize_url(&slack.client_id, slack.redirect_url.as_deref(), &nonce) {
        Ok(url) => {
            state.pending_states.lock().await.insert(nonce);
            Redirect::to(&url).into_response()
        }
        Err(err) => {
            warn!(%err, "failed to build authorize url");
            (StatusCode::INTERNAL_SERVER_ERROR, "install unavailable").into_response()
        }
    }
}

async fn exchange(state: &HttpState, code: &str) -> Result<Installation> {
    let slack = &state.app.config.slack;
    let secret = slack
        .client_secret
        .clone()
        .ok_or_else(|| AppError::Config("slack client secret is not configured".into()))?;
    let mut form = vec![
        ("code", code.to_owned()),
        ("client_id", slack.client_id.clone()),
        ("client_secret", secret),
    ];
    if let Some(redirect) = &slack.redirect_url {
        form.push(("redirect_uri", redirect.clone()));
    }

    let body: Value = state
        .http
        .post(ACCESS_URL)
        .form(&form)
        .send()
        .await
        .map_err(|err| AppError::Slack(format!("oauth.v2.access request: {err}")))?
        .json()
        .await
        .map_err(|err| AppError::Slack(format!("oauth.v2.access parse: {err}")))?;
    let grant = parse_grant(&body)?;

    let installation = Installation::new(
        grant.team_id,
        grant.team_name,
        grant.bot_token,
        grant.bot_user_id,
    );
    state.app.installations.upsert(&installation).await?;
    state
        .app
        .workspaces
        .ensure_exists(&installation.team_id, &installation.team_name)
        .await?;
    Ok(installation)
}

async fn oauth_redirect(
    State(state): State<HttpState>,
    Query(params): Query<RedirectParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!(%error, "oauth install declined");
        return (StatusCode::BAD_REQUEST, format!("Install cancelled: {error}")).into_response();
    }
    let known_state = match params.state {
        Some(nonce) => state.pending_states.lock().await.remove(&nonce),
        None => false,
    };
    let (Some(code), true) = (params.code, known_state) else {
        return (StatusCode::BAD_REQUEST, "Invalid or expired install link").into_response();
    };

    match exchange(&state, &code).await {
        Ok(installation) => {
            info!(team_id = %installation.team_id, team_name = %installation.team_name, "workspace installed");
            (
                StatusCode::OK,
                format!(
                    "Check-in Bot is installed in {}. You can close this tab.",
                    installation.team_name
                ),
            )
                .into_response()
        }
        Err(err) => {
            warn!(%err, "oauth exchange failed");
            (StatusCode::BAD_GATEWAY, "Install failed; please try again").into_response()
        }
    }
}

/// Axum router for the HTTP surface.
pub fn router(app: Arc<AppState>, http: reqwest::Client) -> Router {
    let state = HttpState {
        app,
        http,
        pending_states: Arc::new(Mutex::new(HashSet::new())),
    };
    Router::new()
        .route("/health", get(health))
        .route("/slack/install", get(install))
        .route("/slack/oauth_redirect", get(oauth_redirect))
        .with_state(state)
}

/// Serve the HTTP surface on `config.http_port` until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind.
pub async fn serve_http(app: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], app.config.http_port));
    let http = reqwest::Client::builder()
        .timeout(app.config.http.timeout())
        .build()
        .map_err(|err| AppError::Config(format!("failed to init oauth client: {err}")))?;
    let router = router(app, http);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind http on {bind}: {err}")))?;
    info!(%bind, "starting http server");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("http server error: {err}")))?;

    info!("http server shut down");
    Ok(())
}
