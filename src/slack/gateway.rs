//! Narrow messaging interface the lifecycle and command handlers run against.
//!
//! [`ChatGateway`] is implemented by [`SlackWorkspace`](super::client::SlackWorkspace)
//! for a single workspace's bot token. Every method returns domain types so
//! the core never handles Slack wire structures directly.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use slack_morphism::prelude::SlackBlock;

use crate::models::message::{ChannelMessage, ChannelSummary, Reaction};
use crate::Result;

/// Boxed future returned by every gateway call.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A message to post to a channel or thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Destination channel id.
    pub channel: String,
    /// Message text (Slack mrkdwn).
    pub text: String,
    /// Parent thread timestamp for a reply.
    pub thread_ts: Option<String>,
    /// Disable link unfurling and `@name` resolution.
    pub plain: bool,
}

impl OutgoingMessage {
    /// Top-level message with default rendering.
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            thread_ts: None,
            plain: false,
        }
    }

    /// Post as a reply in the thread rooted at `ts`.
    #[must_use]
    pub fn in_thread(mut self, ts: impl Into<String>) -> Self {
        self.thread_ts = Some(ts.into());
        self
    }

    /// Suppress unfurls and name linking.
    #[must_use]
    pub fn plain(mut self) -> Self {
        self.plain = true;
        self
    }
}

/// Slack primitives used by the bot, scoped to one workspace.
pub trait ChatGateway: Send + Sync {
    /// User id of the bot itself (`auth.test`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn bot_user_id(&self) -> GatewayFuture<'_, String>;

    /// Workspace display name (`team.info`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn team_name(&self) -> GatewayFuture<'_, String>;

    /// Every non-archived public and private channel the bot can see.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if any page fails.
    fn list_channels(&self) -> GatewayFuture<'_, Vec<ChannelSummary>>;

    /// Member user ids of `channel`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if any page fails.
    fn channel_members<'a>(&'a self, channel: &'a str) -> GatewayFuture<'a, Vec<String>>;

    /// Top-level history of `channel`, oldest first, optionally bounded below.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if any page fails.
    fn channel_history<'a>(
        &'a self,
        channel: &'a str,
        oldest: Option<DateTime<Utc>>,
    ) -> GatewayFuture<'a, Vec<ChannelMessage>>;

    /// Replies in the thread rooted at `thread_ts`, excluding the root.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if any page fails.
    fn thread_replies<'a>(
        &'a self,
        channel: &'a str,
        thread_ts: &'a str,
    ) -> GatewayFuture<'a, Vec<ChannelMessage>>;

    /// Create a channel named `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`; restricted workspaces report
    /// `restricted_action`.
    fn create_channel<'a>(
        &'a self,
        name: &'a str,
        is_private: bool,
    ) -> GatewayFuture<'a, ChannelSummary>;

    /// Invite one user into `channel`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the invite is refused.
    fn invite<'a>(&'a self, channel: &'a str, user: &'a str) -> GatewayFuture<'a, ()>;

    /// Remove one user from `channel`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the kick is refused.
    fn kick<'a>(&'a self, channel: &'a str, user: &'a str) -> GatewayFuture<'a, ()>;

    /// Archive `channel`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn archive<'a>(&'a self, channel: &'a str) -> GatewayFuture<'a, ()>;

    /// Post a message and return its timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn post_message(&self, message: OutgoingMessage) -> GatewayFuture<'_, String>;

    /// Send a direct message to `user`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the DM cannot be opened or posted.
    fn send_dm<'a>(&'a self, user: &'a str, text: &'a str) -> GatewayFuture<'a, ()>;

    /// React to a message with emoji `name` (no colons).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn add_reaction<'a>(
        &'a self,
        channel: &'a str,
        ts: &'a str,
        name: &'a str,
    ) -> GatewayFuture<'a, ()>;

    /// Reactions currently on a message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn reactions<'a>(&'a self, channel: &'a str, ts: &'a str) -> GatewayFuture<'a, Vec<Reaction>>;

    /// Upload `content` as a text file into `channel`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if any upload step fails.
    fn upload_text_file<'a>(
        &'a self,
        channel: &'a str,
        filename: &'a str,
        content: &'a str,
    ) -> GatewayFuture<'a, ()>;

    /// Best display name for `user`, falling back to the id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn user_display_name<'a>(&'a self, user: &'a str) -> GatewayFuture<'a, String>;

    /// Publish the App Home tab for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the call fails.
    fn publish_home<'a>(&'a self, user: &'a str, blocks: Vec<SlackBlock>)
        -> GatewayFuture<'a, ()>;
}
