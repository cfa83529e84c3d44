//! Per-workspace configuration record and its value objects.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Broadcast mention used at the top of the monthly announcement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementTag {
    /// `@here`: only active members are notified.
    #[default]
    Here,
    /// `@channel`: every channel member is notified.
    Channel,
}

impl AnnouncementTag {
    /// Slack markup that triggers the broadcast mention.
    #[must_use]
    pub fn mention(self) -> &'static str {
        match self {
            Self::Here => "<!here>",
            Self::Channel => "<!channel>",
        }
    }

    /// Stored string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Here => "here",
            Self::Channel => "channel",
        }
    }
}

impl FromStr for AnnouncementTag {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('@').to_ascii_lowercase().as_str() {
            "here" => Ok(Self::Here),
            "channel" => Ok(Self::Channel),
            other => Err(AppError::Validation(format!(
                "announcement tag must be `here` or `channel`, got `{other}`"
            ))),
        }
    }
}

impl Display for AnnouncementTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two users who must never share a group channel.
///
/// Stored normalized so that `{a, b}` and `{b, a}` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IncompatiblePair {
    first: String,
    second: String,
}

impl IncompatiblePair {
    /// Build a normalized pair.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when both ids are the same user.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Result<Self> {
        let (a, b) = (a.into(), b.into());
        if a == b {
            return Err(AppError::Validation(
                "a user cannot be kept apart from themselves".into(),
            ));
        }
        if a < b {
            Ok(Self {
                first: a,
                second: b,
            })
        } else {
            Ok(Self {
                first: b,
                second: a,
            })
        }
    }

    /// Lexicographically smaller member.
    #[must_use]
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Lexicographically larger member.
    #[must_use]
    pub fn second(&self) -> &str {
        &self.second
    }

    /// Whether `user` is one side of the pair.
    #[must_use]
    pub fn contains(&self, user: &str) -> bool {
        self.first == user || self.second == user
    }

    /// The other side of the pair, if `user` belongs to it.
    #[must_use]
    pub fn counterpart(&self, user: &str) -> Option<&str> {
        if self.first == user {
            Some(&self.second)
        } else if self.second == user {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// Pointer to the message that collected this month's signups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRef {
    /// Channel the announcement was posted in.
    pub channel: String,
    /// Message timestamp (`1700000000.123456`).
    pub ts: String,
}

impl AnnouncementRef {
    /// Parse a Slack message permalink such as
    /// `https://acme.slack.com/archives/C0123/p1700000000123456`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the URL is not a message permalink.
    pub fn from_permalink(url: &str) -> Result<Self> {
        let invalid = || {
            AppError::Validation(
                "expected a message link like https://<team>.slack.com/archives/C123/p1700000000123456"
                    .into(),
            )
        };

        let url = url.trim().trim_start_matches('<').trim_end_matches('>');
        let url = url.split('|').next().unwrap_or(url);
        let path = url.split('?').next().unwrap_or(url);
        let mut segments = path.rsplit('/');
        let message = segments.next().ok_or_else(invalid)?;
        let channel = segments.next().ok_or_else(invalid)?;
        if segments.next() != Some("archives") {
            return Err(invalid());
        }

        let digits = message.strip_prefix('p').ok_or_else(invalid)?;
        if digits.len() <= 6 || !digits.bytes().all(|b| b.is_ascii_digit()) || channel.is_empty() {
            return Err(invalid());
        }
        let (secs, micros) = digits.split_at(digits.len() - 6);

        Ok(Self {
            channel: channel.to_owned(),
            ts: format!("{secs}.{micros}"),
        })
    }
}

/// Pending `king me` passcode for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPasscode {
    /// Six-digit code.
    pub code: String,
    /// Issue time, used for expiry.
    pub issued_at: DateTime<Utc>,
}

impl AdminPasscode {
    /// Whether the code is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }
}

/// Settings and durable state for one Slack workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Slack team id (primary key).
    pub team_id: String,
    /// Human-readable workspace name.
    pub team_name: String,
    /// Users allowed to run admin commands; injected one per group.
    pub admins: BTreeSet<String>,
    /// Users who must be placed in different groups.
    pub incompatible_pairs: BTreeSet<IncompatiblePair>,
    /// Users added to every month's pool regardless of reactions.
    pub always_include_users: BTreeSet<String>,
    /// Channel-name template with `[year]`, `[month]`, optional `[number]`.
    pub channel_format: Option<String>,
    /// Channel where the monthly signup announcement is posted.
    pub announcement_channel: Option<String>,
    /// Broadcast mention used in the announcement.
    pub announcement_tag: AnnouncementTag,
    /// Replacement for the default announcement body; empty means default.
    pub custom_announcement_text: String,
    /// Seed next month's pool from recent posting activity.
    pub auto_add_active_users: bool,
    /// Most recent signup announcement.
    pub last_announcement: Option<AnnouncementRef>,
    /// Outstanding admin passcodes keyed by user id.
    pub pending_admin_passcodes: BTreeMap<String, AdminPasscode>,
    /// First time the bot saw this workspace.
    pub installed_at: DateTime<Utc>,
}

impl WorkspaceConfig {
    /// Fresh record with default settings.
    #[must_use]
    pub fn new(team_id: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            team_name: team_name.into(),
            admins: BTreeSet::new(),
            incompatible_pairs: BTreeSet::new(),
            always_include_users: BTreeSet::new(),
            channel_format: None,
            announcement_channel: None,
            announcement_tag: AnnouncementTag::default(),
            custom_announcement_text: String::new(),
            auto_add_active_users: false,
            last_announcement: None,
            pending_admin_passcodes: BTreeMap::new(),
            installed_at: Utc::now(),
        }
    }

    /// Whether `user` is a workspace admin.
    #[must_use]
    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.contains(user)
    }

    /// Every user that must not share a group with `user`.
    #[must_use]
    pub fn counterparts<'a>(&'a self, user: &'a str) -> Vec<&'a str> {
        self.incompatible_pairs
            .iter()
            .filter_map(|pair| pair.counterpart(user))
            .collect()
    }

    /// Admins in stable order.
    #[must_use]
    pub fn admin_list(&self) -> Vec<String> {
        self.admins.iter().cloned().collect()
    }
}
