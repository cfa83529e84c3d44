//! Slack Web API and Socket Mode client.
//!
//! [`SlackService`] owns the shared HTTPS client and the Socket Mode
//! listener. [`SlackWorkspace`] binds that client to one workspace's bot
//! token and implements [`ChatGateway`]. Every call runs under a per-call
//! timeout with bounded exponential backoff.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsArchiveRequest,
    SlackApiConversationsCreateRequest, SlackApiConversationsHistoryRequest,
    SlackApiConversationsInviteRequest, SlackApiConversationsKickRequest,
    SlackApiConversationsListRequest, SlackApiConversationsMembersRequest,
    SlackApiConversationsOpenRequest, SlackApiConversationsRepliesRequest, SlackApiFilesComplete,
    SlackApiFilesCompleteUploadExternalRequest, SlackApiFilesGetUploadUrlExternalRequest,
    SlackApiReactionsAddRequest, SlackApiReactionsGetRequest, SlackApiReactionsGetResponse,
    SlackApiTeamInfoRequest, SlackApiToken, SlackApiTokenType,
    SlackApiTokenValue, SlackApiUsersInfoRequest, SlackApiViewsPublishRequest, SlackBlock,
    SlackChannelId, SlackChannelInfo, SlackClient, SlackClientEventsListenerEnvironment,
    SlackClientHyperHttpsConnector, SlackClientSession, SlackClientSocketModeConfig,
    SlackClientSocketModeListener, SlackConversationType, SlackCursorId, SlackHistoryMessage,
    SlackHomeView, SlackMessageContent, SlackReactionName, SlackResponseMetadata,
    SlackSocketModeListenerCallbacks, SlackTs, SlackUserId, SlackView,
};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info, warn};

use crate::config::HttpConfig;
use crate::models::message::{ChannelMessage, ChannelSummary, MessageSubtype, Reaction};
use crate::slack::events;
use crate::slack::gateway::{ChatGateway, GatewayFuture, OutgoingMessage};
use crate::state::AppState;
use crate::{AppError, Result};

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const PAGE_SIZE: u16 = 200;

/// Hyper-backed Slack client shared by every workspace.
pub type SlackHttpClient = SlackClient<SlackClientHyperHttpsConnector>;

/// Process-wide Slack client plus the Socket Mode listener.
pub struct SlackService {
    client: Arc<SlackHttpClient>,
    http: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl SlackService {
    /// Create the HTTPS connector and shared clients.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn new(http_config: &HttpConfig) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let http = reqwest::Client::builder()
            .timeout(http_config.timeout())
            .build()
            .map_err(|err| AppError::Slack(format!("failed to init upload client: {err}")))?;

        Ok(Self {
            client: Arc::new(SlackClient::new(connector)),
            http,
            timeout: http_config.timeout(),
            max_retries: http_config.max_retries,
        })
    }

    /// Shared Slack client (OAuth exchange uses it without a token).
    #[must_use]
    pub fn client(&self) -> Arc<SlackHttpClient> {
        Arc::clone(&self.client)
    }

    /// Gateway bound to a workspace bot token.
    #[must_use]
    pub fn workspace(&self, bot_token: &str) -> SlackWorkspace {
        SlackWorkspace {
            client: Arc::clone(&self.client),
            http: self.http.clone(),
            token: SlackApiToken {
                token_value: SlackApiTokenValue(bot_token.to_owned()),
                cookie: None,
                team_id: None,
                scope: None,
                token_type: Some(SlackApiTokenType::Bot),
            },
            timeout: self.timeout,
            max_retries: self.max_retries,
        }
    }

    /// Connect Socket Mode with the app-level token and dispatch push events.
    #[must_use]
    pub fn spawn_socket_mode(&self, app_token: &str, state: Arc<AppState>) -> JoinHandle<()> {
        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(app_token.to_owned()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(&self.client))
                .with_error_handler(|err, _client, _state| {
                    error!(?err, "socket mode error");
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR
                })
                .with_user_state(state),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(|event, _client, _state| async move {
                info!(?event, "socket hello");
            })
            .with_push_events(events::handle_push_event);
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }

            listener.serve().await;
            info!("socket mode listener exited");
        })
    }
}

/// Slack gateway for one workspace.
#[derive(Clone)]
pub struct SlackWorkspace {
    client: Arc<SlackHttpClient>,
    http: reqwest::Client,
    token: SlackApiToken,
    timeout: Duration,
    max_retries: u32,
}

impl SlackWorkspace {
    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }

    /// Run one API call with timeout and retry.
    ///
    /// API-level refusals (`channel_not_found`, `restricted_action`, ...)
    /// are returned immediately; rate limits, transport errors, and
    /// timeouts back off and retry up to `max_retries` times.
    async fn call<T, F, Fut>(&self, method: &'static str, attempt: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, SlackClientError>>,
    {
        let mut backoff = INITIAL_RETRY_DELAY;
        let mut retries = 0;
        loop {
            let (delay, reason) = match tokio::time::timeout(self.timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err @ SlackClientError::ApiError(_))) => {
                    return Err(AppError::Slack(format!("{method} failed: {err}")));
                }
                Ok(Err(SlackClientError::RateLimitError(rate))) => (
                    rate.retry_after.unwrap_or(backoff),
                    "rate limited".to_owned(),
                ),
                Ok(Err(err)) => (backoff, err.to_string()),
                Err(_) => (backoff, "timed out".to_owned()),
            };

            if retries >= self.max_retries {
                return Err(AppError::Slack(format!(
                    "{method} failed after {} attempts: {reason}",
                    retries + 1
                )));
            }
            retries += 1;
            warn!(method, reason, delay = ?delay, retries, "slack call failed; retrying");
            sleep(delay).await;
            backoff = (backoff * 2).min(MAX_RETRY_DELAY);
        }
    }

    async fn open_dm(&self, user: &str) -> Result<SlackChannelId> {
        let session = self.session();
        let request =
            SlackApiConversationsOpenRequest::new().with_users(vec![SlackUserId(user.to_owned())]);
        let response = self
            .call("conversations.open", || session.conversations_open(&request))
            .await?;
        Ok(response.channel.id)
    }

    async fn history_page(
        &self,
        request: &SlackApiConversationsHistoryRequest,
    ) -> Result<(Vec<SlackHistoryMessage>, Option<SlackCursorId>)> {
        let session = self.session();
        let page = self
            .call("conversations.history", || session.conversations_history(request))
            .await?;
        Ok((page.messages, next_cursor(page.response_metadata.as_ref())))
    }
}

fn next_cursor(metadata: Option<&SlackResponseMetadata>) -> Option<SlackCursorId> {
    metadata
        .and_then(|meta| meta.next_cursor.clone())
        .filter(|cursor| !cursor.0.is_empty())
}

fn channel_summary(info: SlackChannelInfo) -> ChannelSummary {
    ChannelSummary {
        id: info.id.0,
        name: info.name.unwrap_or_default(),
        is_private: info.flags.is_private.unwrap_or(false),
    }
}

/// Convert a Slack history entry into the core's message record.
fn to_channel_message(message: SlackHistoryMessage) -> ChannelMessage {
    let subtype = message
        .subtype
        .as_ref()
        .and_then(|subtype| serde_json::to_value(subtype).ok())
        .and_then(|value| value.as_str().map(MessageSubtype::from_slack));

    ChannelMessage {
        author: message.sender.user.map(|user| user.0),
        ts: message.origin.ts.0,
        text: message.content.text.unwrap_or_default(),
        thread_ts: message.origin.thread_ts.map(|ts| ts.0),
        subtype,
    }
}

fn sort_chronologically(messages: &mut [ChannelMessage]) {
    messages.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()).then_with(|| a.ts.cmp(&b.ts)));
}

fn slack_ts(at: DateTime<Utc>) -> SlackTs {
    SlackTs(format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros()))
}

/// Reactions on the message a `reactions.get` call returned. Skin-tone
/// variants (`thumbsup::skin-tone-2`) fold into their base emoji.
fn reactions_of(
    response: SlackApiReactionsGetResponse,
    channel: &str,
    ts: &str,
) -> Result<Vec<Reaction>> {
    let SlackApiReactionsGetResponse::Message(found) = response else {
        return Err(AppError::NotFound(format!("message {ts} in {channel}")));
    };

    Ok(found
        .message
        .content
        .reactions
        .unwrap_or_default()
        .into_iter()
        .map(|reaction| Reaction {
            name: reaction
                .name
                .0
                .split("::")
                .next()
                .unwrap_or_default()
                .to_owned(),
            users: reaction.users.into_iter().map(|user| user.0).collect(),
        })
        .collect())
}

impl ChatGateway for SlackWorkspace {
    fn bot_user_id(&self) -> GatewayFuture<'_, String> {
        Box::pin(async move {
            let session = self.session();
            let response = self.call("auth.test", || session.auth_test()).await?;
            Ok(response.user_id.0)
        })
    }

    fn team_name(&self) -> GatewayFuture<'_, String> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiTeamInfoRequest::new();
            let response = self
                .call("team.info", || session.team_info(&request))
                .await?;
            Ok(response.team.name.unwrap_or_else(|| response.team.id.0.clone()))
        })
    }

    fn list_channels(&self) -> GatewayFuture<'_, Vec<ChannelSummary>> {
        Box::pin(async move {
            let session = self.session();
            let mut channels = Vec::new();
            let mut cursor = None;
            loop {
                let mut request = SlackApiConversationsListRequest::new()
                    .with_exclude_archived(true)
                    .with_types(vec![
                        SlackConversationType::Public,
                        SlackConversationType::Private,
                    ])
                    .with_limit(PAGE_SIZE);
                request.cursor = cursor;
                let page = self
                    .call("conversations.list", || session.conversations_list(&request))
                    .await?;
                channels.extend(page.channels.into_iter().map(channel_summary));
                cursor = next_cursor(page.response_metadata.as_ref());
                if cursor.is_none() {
                    break;
                }
            }
            Ok(channels)
        })
    }

    fn channel_members<'a>(&'a self, channel: &'a str) -> GatewayFuture<'a, Vec<String>> {
        Box::pin(async move {
            let session = self.session();
            let mut members = Vec::new();
            let mut cursor = None;
            loop {
                let mut request = SlackApiConversationsMembersRequest::new()
                    .with_channel(SlackChannelId(channel.to_owned()))
                    .with_limit(PAGE_SIZE);
                request.cursor = cursor;
                let page = self
                    .call("conversations.members", || {
                        session.conversations_members(&request)
                    })
                    .await?;
                members.extend(page.members.into_iter().map(|user| user.0));
                cursor = next_cursor(page.response_metadata.as_ref());
                if cursor.is_none() {
                    break;
                }
            }
            Ok(members)
        })
    }

    fn channel_history<'a>(
        &'a self,
        channel: &'a str,
        oldest: Option<DateTime<Utc>>,
    ) -> GatewayFuture<'a, Vec<ChannelMessage>> {
        Box::pin(async move {
            let mut messages = Vec::new();
            let mut cursor = None;
            loop {
                let mut request = SlackApiConversationsHistoryRequest::new()
                    .with_channel(SlackChannelId(channel.to_owned()))
                    .with_limit(PAGE_SIZE);
                request.oldest = oldest.map(slack_ts);
                request.cursor = cursor;
                let (page, next) = self.history_page(&request).await?;
                messages.extend(page.into_iter().map(to_channel_message));
                cursor = next;
                if cursor.is_none() {
                    break;
                }
            }
            sort_chronologically(&mut messages);
            Ok(messages)
        })
    }

    fn thread_replies<'a>(
        &'a self,
        channel: &'a str,
        thread_ts: &'a str,
    ) -> GatewayFuture<'a, Vec<ChannelMessage>> {
        Box::pin(async move {
            let session = self.session();
            let mut replies = Vec::new();
            let mut cursor = None;
            loop {
                let mut request = SlackApiConversationsRepliesRequest::new(
                    SlackChannelId(channel.to_owned()),
                    SlackTs(thread_ts.to_owned()),
                )
                .with_limit(PAGE_SIZE);
                request.cursor = cursor;
                let page = self
                    .call("conversations.replies", || {
                        session.conversations_replies(&request)
                    })
                    .await?;
                replies.extend(
                    page.messages
                        .into_iter()
                        .map(to_channel_message)
                        .filter(|message| message.ts != thread_ts),
                );
                cursor = next_cursor(page.response_metadata.as_ref());
                if cursor.is_none() {
                    break;
                }
            }
            sort_chronologically(&mut replies);
            Ok(replies)
        })
    }

    fn create_channel<'a>(
        &'a self,
        name: &'a str,
        is_private: bool,
    ) -> GatewayFuture<'a, ChannelSummary> {
        Box::pin(async move {
            let session = self.session();
            let request =
                SlackApiConversationsCreateRequest::new(name.to_owned()).with_is_private(is_private);
            let response = self
                .call("conversations.create", || {
                    session.conversations_create(&request)
                })
                .await?;
            info!(channel_id = %response.channel.id, name, "channel created");
            Ok(channel_summary(response.channel))
        })
    }

    fn invite<'a>(&'a self, channel: &'a str, user: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiConversationsInviteRequest::new(
                SlackChannelId(channel.to_owned()),
                vec![SlackUserId(user.to_owned())],
            );
            self.call("conversations.invite", || {
                session.conversations_invite(&request)
            })
            .await?;
            Ok(())
        })
    }

    fn kick<'a>(&'a self, channel: &'a str, user: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiConversationsKickRequest::new(
                SlackChannelId(channel.to_owned()),
                SlackUserId(user.to_owned()),
            );
            self.call("conversations.kick", || session.conversations_kick(&request))
                .await?;
            Ok(())
        })
    }

    fn archive<'a>(&'a self, channel: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiConversationsArchiveRequest::new(SlackChannelId(channel.to_owned()));
            self.call("conversations.archive", || {
                session.conversations_archive(&request)
            })
            .await?;
            Ok(())
        })
    }

    fn post_message(&self, message: OutgoingMessage) -> GatewayFuture<'_, String> {
        Box::pin(async move {
            let session = self.session();
            let mut request = SlackApiChatPostMessageRequest::new(
                SlackChannelId(message.channel),
                SlackMessageContent::new().with_text(message.text),
            );
            request.thread_ts = message.thread_ts.map(SlackTs);
            if message.plain {
                request.link_names = Some(false);
                request.unfurl_links = Some(false);
                request.unfurl_media = Some(false);
            }
            let response = self
                .call("chat.postMessage", || session.chat_post_message(&request))
                .await?;
            Ok(response.ts.0)
        })
    }

    fn send_dm<'a>(&'a self, user: &'a str, text: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let channel = self.open_dm(user).await?;
            self.post_message(OutgoingMessage::new(channel.0, text))
                .await?;
            Ok(())
        })
    }

    fn add_reaction<'a>(
        &'a self,
        channel: &'a str,
        ts: &'a str,
        name: &'a str,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiReactionsAddRequest::new(
                SlackChannelId(channel.to_owned()),
                SlackReactionName(name.to_owned()),
                SlackTs(ts.to_owned()),
            );
            self.call("reactions.add", || session.reactions_add(&request))
                .await?;
            Ok(())
        })
    }

    fn reactions<'a>(&'a self, channel: &'a str, ts: &'a str) -> GatewayFuture<'a, Vec<Reaction>> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiReactionsGetRequest::new()
                .with_channel(SlackChannelId(channel.to_owned()))
                .with_timestamp(SlackTs(ts.to_owned()))
                .with_full(true);
            let response = self
                .call("reactions.get", || session.reactions_get(&request))
                .await?;
            reactions_of(response, channel, ts)
        })
    }

    fn upload_text_file<'a>(
        &'a self,
        channel: &'a str,
        filename: &'a str,
        content: &'a str,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session();

            let url_request =
                SlackApiFilesGetUploadUrlExternalRequest::new(filename.into(), content.len());
            let url_response = self
                .call("files.getUploadURLExternal", || {
                    session.get_upload_url_external(&url_request)
                })
                .await?;

            let upload = self
                .http
                .post(url_response.upload_url.0.to_string())
                .body(content.to_owned())
                .send()
                .await
                .map_err(|err| AppError::Slack(format!("failed to upload file: {err}")))?;
            if !upload.status().is_success() {
                return Err(AppError::Slack(format!(
                    "file upload returned HTTP {}",
                    upload.status()
                )));
            }

            let mut complete_request =
                SlackApiFilesCompleteUploadExternalRequest::new(vec![SlackApiFilesComplete {
                    id: url_response.file_id,
                    title: Some(filename.into()),
                }]);
            complete_request.channel_id = Some(SlackChannelId(channel.to_owned()));
            self.call("files.completeUploadExternal", || {
                session.files_complete_upload_external(&complete_request)
            })
            .await?;
            Ok(())
        })
    }

    fn user_display_name<'a>(&'a self, user: &'a str) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiUsersInfoRequest::new(SlackUserId(user.to_owned()));
            let response = self
                .call("users.info", || session.users_info(&request))
                .await?;
            let profile = response.user.profile.as_ref();
            Ok(profile
                .and_then(|p| p.display_name.clone())
                .filter(|name| !name.is_empty())
                .or_else(|| profile.and_then(|p| p.real_name.clone()))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| user.to_owned()))
        })
    }

    fn publish_home<'a>(
        &'a self,
        user: &'a str,
        blocks: Vec<SlackBlock>,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session();
            let request = SlackApiViewsPublishRequest::new(
                SlackUserId(user.to_owned()),
                SlackView::Home(SlackHomeView::new(blocks)),
            );
            self.call("views.publish", || session.views_publish(&request))
                .await?;
            Ok(())
        })
    }
}
