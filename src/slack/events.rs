//! Socket Mode push-event dispatch.
//!
//! Messages in DMs are commands; top-level human messages anywhere else are
//! check-ins that get emoji reactions. `app_home_opened` publishes the Home
//! tab. Each event is handled in its own task so the Socket Mode ack is
//! never held up by Slack or model calls.

use std::sync::Arc;

use chrono::Utc;
use slack_morphism::prelude::{
    SlackClient, SlackClientEventsUserState, SlackClientHyperHttpsConnector,
    SlackEventCallbackBody, SlackMessageEvent, SlackPushEventCallback,
};
use tracing::{debug, info_span, warn, Instrument};

use crate::orchestrator::calendar::{reference_date, reference_offset};
use crate::slack::handlers::{self, DirectMessage};
use crate::state::AppState;

/// The parts of a message event the router looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel id (`D…` for DMs).
    pub channel: String,
    /// Slack channel type (`im`, `channel`, `group`, ...), when sent.
    pub channel_type: Option<String>,
    /// Posting user.
    pub user: Option<String>,
    /// Whether a bot integration posted it.
    pub from_bot: bool,
    /// Event subtype (`message_changed`, `channel_join`, ...).
    pub subtype: Option<String>,
    /// Message timestamp.
    pub ts: String,
    /// Parent thread timestamp for replies.
    pub thread_ts: Option<String>,
    /// Message text.
    pub text: String,
}

impl InboundMessage {
    /// Whether the message arrived in a direct message with the bot.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
            || (self.channel_type.is_none() && self.channel.starts_with('D'))
    }

    fn from_event(event: &SlackMessageEvent) -> Self {
        Self {
            channel: event
                .origin
                .channel
                .as_ref()
                .map(|channel| channel.0.clone())
                .unwrap_or_default(),
            channel_type: event.origin.channel_type.as_ref().map(|kind| kind.0.clone()),
            user: event.sender.user.as_ref().map(|user| user.0.clone()),
            from_bot: event.sender.bot_id.is_some(),
            subtype: event
                .subtype
                .as_ref()
                .and_then(|subtype| serde_json::to_value(subtype).ok())
                .and_then(|value| value.as_str().map(str::to_owned)),
            ts: event.origin.ts.0.clone(),
            thread_ts: event.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
            text: event
                .content
                .as_ref()
                .and_then(|content| content.text.clone())
                .unwrap_or_default(),
        }
    }
}

/// What to do with a message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRoute {
    /// A DM command from `user`.
    Command {
        /// Sender.
        user: String,
    },
    /// A top-level channel check-in to react to.
    CheckIn,
    /// Bot output, system notices, edits, and thread replies.
    Ignore,
}

/// Decide how to handle a message event.
#[must_use]
pub fn route_message(message: &InboundMessage) -> MessageRoute {
    if message.from_bot || message.subtype.is_some() || message.channel.is_empty() {
        return MessageRoute::Ignore;
    }
    let Some(user) = message.user.clone() else {
        return MessageRoute::Ignore;
    };
    if message.is_direct() {
        return MessageRoute::Command { user };
    }
    if message.thread_ts.is_some() {
        return MessageRoute::Ignore;
    }
    MessageRoute::CheckIn
}

async fn handle_message(app: Arc<AppState>, team_id: String, message: InboundMessage) {
    let route = route_message(&message);
    if route == MessageRoute::Ignore {
        debug!(team_id = %team_id, channel_id = %message.channel, "message ignored");
        return;
    }

    let gateway = match app.gateway_for(&team_id).await {
        Ok(gateway) => gateway,
        Err(err) => {
            warn!(team_id = %team_id, %err, "no gateway for event");
            return;
        }
    };

    match route {
        MessageRoute::Command { user } => {
            let today = reference_offset(app.config.lifecycle.utc_offset_hours)
                .map_or_else(|_| Utc::now().date_naive(), |offset| reference_date(Utc::now(), offset));
            let dm = DirectMessage {
                gateway: &gateway,
                repo: &app.workspaces,
                team_id: &team_id,
                user_id: &user,
                channel_id: &message.channel,
                passcode_ttl: app.config.passcode_ttl(),
                today,
            };
            handlers::handle_direct_message(&dm, &message.text).await;
        }
        MessageRoute::CheckIn => {
            let Some(suggester) = app.emoji.as_deref() else {
                debug!(team_id = %team_id, "emoji suggester disabled");
                return;
            };
            handlers::emoji::react_to_checkin(
                &gateway,
                suggester,
                &message.channel,
                &message.ts,
                &message.text,
                app.config.llm.max_reactions,
            )
            .await;
        }
        MessageRoute::Ignore => {}
    }
}

async fn handle_home_opened(app: Arc<AppState>, team_id: String, user_id: String) {
    let result = async {
        let gateway = app.gateway_for(&team_id).await?;
        handlers::home::publish_home(&gateway, &app.workspaces, &team_id, &user_id).await
    }
    .await;
    if let Err(err) = result {
        warn!(team_id = %team_id, user_id = %user_id, %err, "home tab publish failed");
    }
}

/// Handle push events delivered via Socket Mode.
///
/// # Errors
///
/// Never fails; handler errors are logged.
pub async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::UserCallbackResult<()> {
    let app_state: Option<Arc<AppState>> = {
        let guard = state.read().await;
        guard.get_user_state::<Arc<AppState>>().cloned()
    };
    let Some(app) = app_state else {
        warn!("app state not available; dropping push event");
        return Ok(());
    };

    let team_id = event.team_id.0.clone();
    match &event.event {
        SlackEventCallbackBody::Message(message) => {
            let inbound = InboundMessage::from_event(message);
            let span = info_span!("message_event", team_id = %team_id, channel_id = %inbound.channel);
            tokio::spawn(handle_message(app, team_id, inbound).instrument(span));
        }
        SlackEventCallbackBody::AppHomeOpened(opened) => {
            if !is_home_tab(opened.tab.as_deref()) {
                return Ok(());
            }
            let user_id = opened.user.0.clone();
            let span = info_span!("app_home_opened", team_id = %team_id, user_id = %user_id);
            tokio::spawn(handle_home_opened(app, team_id, user_id).instrument(span));
        }
        other => debug!(?other, "unhandled push event"),
    }
    Ok(())
}

/// `app_home_opened` also fires for the Messages tab; only Home is rendered.
fn is_home_tab(tab: Option<&str>) -> bool {
    tab == Some("home")
}
