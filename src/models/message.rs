//! Channel, message, and reaction records as seen by the core.
//!
//! Slack API types are converted into these at the gateway boundary so the
//! classifier and orchestrator never touch wire types.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Message subtypes the core distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSubtype {
    /// A user joined the channel.
    ChannelJoin,
    /// A user left the channel.
    ChannelLeave,
    /// A thread reply also sent to the channel.
    ThreadBroadcast,
    /// A message posted by a bot integration.
    BotMessage,
    /// Any other subtype, kept verbatim.
    Other(String),
}

impl MessageSubtype {
    /// Map Slack's subtype string.
    #[must_use]
    pub fn from_slack(raw: &str) -> Self {
        match raw {
            "channel_join" => Self::ChannelJoin,
            "channel_leave" => Self::ChannelLeave,
            "thread_broadcast" => Self::ThreadBroadcast,
            "bot_message" => Self::BotMessage,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Join/leave notices, which never count as posting.
    #[must_use]
    pub fn is_membership_event(&self) -> bool {
        matches!(self, Self::ChannelJoin | Self::ChannelLeave)
    }

    /// Subtypes that never count as a member's own activity: membership
    /// notices and posts made by bot integrations.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.is_membership_event() || matches!(self, Self::BotMessage)
    }
}

/// One message from a channel history or thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Posting user; `None` for some bot and system messages.
    pub author: Option<String>,
    /// Message timestamp (`1700000000.123456`).
    pub ts: String,
    /// Message text.
    pub text: String,
    /// Parent thread timestamp; equals `ts` on a thread root.
    pub thread_ts: Option<String>,
    /// Message subtype, `None` for ordinary user messages.
    pub subtype: Option<MessageSubtype>,
}

impl ChannelMessage {
    /// Ordinary top-level message by `author`.
    #[must_use]
    pub fn top_level(author: &str, ts: &str, text: &str) -> Self {
        Self {
            author: Some(author.to_owned()),
            ts: ts.to_owned(),
            text: text.to_owned(),
            thread_ts: None,
            subtype: None,
        }
    }

    /// Reply by `author` in the thread rooted at `parent_ts`.
    #[must_use]
    pub fn reply(author: &str, ts: &str, parent_ts: &str, text: &str) -> Self {
        Self {
            author: Some(author.to_owned()),
            ts: ts.to_owned(),
            text: text.to_owned(),
            thread_ts: Some(parent_ts.to_owned()),
            subtype: None,
        }
    }

    /// Attach a subtype.
    #[must_use]
    pub fn with_subtype(mut self, subtype: MessageSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    /// Whether this message lives inside a thread rather than the channel.
    #[must_use]
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts
            .as_deref()
            .is_some_and(|parent| parent != self.ts)
    }

    /// Whether this is a join/leave notice.
    #[must_use]
    pub fn is_membership_event(&self) -> bool {
        self.subtype
            .as_ref()
            .is_some_and(MessageSubtype::is_membership_event)
    }

    /// Whether this message shows up in the channel itself as a member's
    /// post: top-level or broadcast from a thread, of any subtype other
    /// than the ignored ones.
    #[must_use]
    pub fn is_channel_post(&self) -> bool {
        if self.subtype.as_ref().is_some_and(MessageSubtype::is_ignored) {
            return false;
        }
        !self.is_thread_reply() || self.subtype == Some(MessageSubtype::ThreadBroadcast)
    }

    /// Parsed timestamp, if `ts` is well formed.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        ts_to_datetime(&self.ts)
    }
}

/// Convert a Slack `ts` string into a UTC instant.
#[must_use]
pub fn ts_to_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, micros) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{micros:0<6}").get(..6)?.parse().ok()?;
    Utc.timestamp_opt(secs, micros * 1000).single()
}

/// Emoji reaction on a message with the users who added it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Emoji short-code without colons; skin-tone suffixes stripped.
    pub name: String,
    /// Reacting user ids.
    pub users: Vec<String>,
}

/// Minimal view of a Slack conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Channel id.
    pub id: String,
    /// Channel name without `#`.
    pub name: String,
    /// Whether the channel is private.
    pub is_private: bool,
}
