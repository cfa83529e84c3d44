//! Direct-message command parser.
//!
//! Turns the text of a DM to the bot into a [`Command`]. Parsing is pure;
//! execution lives in [`handlers`](super::handlers).

use std::sync::LazyLock;

use regex::Regex;

use crate::{AppError, Result};

static USER_MENTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<@([UW][A-Z0-9]+)(?:\|[^>]*)?>").ok());

static CHANNEL_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^<#([CG][A-Z0-9]+)(?:\|([^>]*))?>$").ok());

static PASSCODE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d{6}$").ok());

/// A channel as written in a message: resolved link or bare `#name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// `<#C123|name>` as rendered by Slack.
    Id {
        /// Channel id.
        id: String,
        /// Display name, when Slack included it.
        name: Option<String>,
    },
    /// `#name` typed without autocomplete.
    Name(String),
}

impl ChannelRef {
    /// Parse a single channel token; `None` if `raw` is not one.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(caps) = CHANNEL_LINK.as_ref().and_then(|re| re.captures(raw)) {
            return Some(Self::Id {
                id: caps[1].to_owned(),
                name: caps
                    .get(2)
                    .map(|m| m.as_str().to_owned())
                    .filter(|name| !name.is_empty()),
            });
        }
        let name = raw.strip_prefix('#')?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_'));
        valid.then(|| Self::Name(name.to_owned()))
    }
}

/// Everything the bot understands in a DM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask for an admin passcode (anyone).
    KingMe,
    /// Submit a six-digit admin passcode (anyone).
    Passcode(String),
    /// Never place these two users in the same group.
    KeepApart(String, String),
    /// Drop a keep-apart rule.
    StopKeepingApart(String, String),
    /// Add users to every month's pool.
    AlwaysInclude(Vec<String>),
    /// Remove users from the always-include list.
    RemoveAlwaysInclude(Vec<String>),
    /// Set the channel-name template.
    SetChannelFormat(String),
    /// Set where the monthly announcement is posted.
    SetAnnouncementChannel(ChannelRef),
    /// Point at an existing announcement by permalink.
    SetAnnouncementLink(String),
    /// Set the broadcast mention (`here` or `channel`).
    SetAnnouncementTag(String),
    /// Replace the announcement body; empty restores the default.
    SetAnnouncementText(String),
    /// Toggle seeding the pool from recent activity.
    SetAutoAdd(bool),
    /// Show the workspace's current settings.
    ShowSettings,
    /// Export the sender's own messages from a channel (anyone).
    Export(ChannelRef),
    /// Anything unrecognised.
    Help,
}

impl Command {
    /// Whether only workspace admins may run this command.
    #[must_use]
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Self::KingMe | Self::Passcode(_) | Self::Export(_) | Self::Help
        )
    }
}

/// User ids mentioned as `<@U123>` in `text`, in order, deduplicated.
#[must_use]
pub fn mentioned_users(text: &str) -> Vec<String> {
    let Some(re) = USER_MENTION.as_ref() else {
        return Vec::new();
    };
    let mut users: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let user = caps[1].to_owned();
        if !users.contains(&user) {
            users.push(user);
        }
    }
    users
}

/// Case-insensitive prefix strip that returns the original-case remainder.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = text.get(keyword.len()..)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn two_users(rest: &str, usage: &str) -> Result<(String, String)> {
    match mentioned_users(rest).as_slice() {
        [a, b] => Ok((a.clone(), b.clone())),
        _ => Err(AppError::Validation(format!(
            "mention exactly two people: `{usage} @user1 @user2`"
        ))),
    }
}

fn some_users(rest: &str, usage: &str) -> Result<Vec<String>> {
    let users = mentioned_users(rest);
    if users.is_empty() {
        return Err(AppError::Validation(format!(
            "mention at least one person: `{usage} @user ...`"
        )));
    }
    Ok(users)
}

/// Parse a DM into a command.
///
/// # Errors
///
/// Returns `AppError::Validation` when a known command has malformed
/// arguments. Unknown text parses as [`Command::Help`].
pub fn parse(text: &str) -> Result<Command> {
    let text = text.trim();

    if text.eq_ignore_ascii_case("king me") {
        return Ok(Command::KingMe);
    }
    if PASSCODE.as_ref().is_some_and(|re| re.is_match(text)) {
        return Ok(Command::Passcode(text.to_owned()));
    }
    if let Some(channel) = ChannelRef::parse(text) {
        return Ok(Command::Export(channel));
    }

    // Longer keywords first so `remove from always include` wins over
    // `always include`.
    if let Some(rest) = strip_keyword(text, "stop keeping apart") {
        let (a, b) = two_users(rest, "stop keeping apart")?;
        return Ok(Command::StopKeepingApart(a, b));
    }
    if let Some(rest) = strip_keyword(text, "keep apart") {
        let (a, b) = two_users(rest, "keep apart")?;
        return Ok(Command::KeepApart(a, b));
    }
    if let Some(rest) = strip_keyword(text, "remove from always include") {
        return some_users(rest, "remove from always include").map(Command::RemoveAlwaysInclude);
    }
    if let Some(rest) = strip_keyword(text, "always include") {
        return some_users(rest, "always include").map(Command::AlwaysInclude);
    }
    if let Some(rest) = strip_keyword(text, "set channel format") {
        if rest.is_empty() {
            return Err(AppError::Validation(
                "usage: `set channel format check-ins-[year]-[month]`".into(),
            ));
        }
        return Ok(Command::SetChannelFormat(rest.to_owned()));
    }
    if let Some(rest) = strip_keyword(text, "set announcement channel") {
        return ChannelRef::parse(rest)
            .map(Command::SetAnnouncementChannel)
            .ok_or_else(|| {
                AppError::Validation("usage: `set announcement channel #channel`".into())
            });
    }
    if let Some(rest) = strip_keyword(text, "set announcement link") {
        if rest.is_empty() {
            return Err(AppError::Validation(
                "usage: `set announcement link <message link>`".into(),
            ));
        }
        return Ok(Command::SetAnnouncementLink(rest.to_owned()));
    }
    if let Some(rest) = strip_keyword(text, "set announcement tag") {
        return Ok(Command::SetAnnouncementTag(rest.to_owned()));
    }
    if let Some(rest) = strip_keyword(text, "set announcement text") {
        return Ok(Command::SetAnnouncementText(rest.to_owned()));
    }
    if let Some(rest) = strip_keyword(text, "set auto-add") {
        return match rest.to_ascii_lowercase().as_str() {
            "on" => Ok(Command::SetAutoAdd(true)),
            "off" => Ok(Command::SetAutoAdd(false)),
            _ => Err(AppError::Validation("usage: `set auto-add on|off`".into())),
        };
    }
    if text.eq_ignore_ascii_case("show settings") {
        return Ok(Command::ShowSettings);
    }

    Ok(Command::Help)
}

/// Reply to unrecognised DMs.
#[must_use]
pub fn help_text(is_admin: bool) -> String {
    let mut text = String::from(
        "Hi! Here's what I can do:\n\
         • Send me a channel like `#check-ins-2025-03` and I'll send you a file with your own \
         messages from it.\n\
         • `king me`: request a passcode to become an admin.",
    );
    if is_admin {
        text.push_str(
            "\n\n*Admin commands*\n\
             • `keep apart @user1 @user2` / `stop keeping apart @user1 @user2`\n\
             • `always include @user ...` / `remove from always include @user ...`\n\
             • `set channel format check-ins-[year]-[month]` (optional `[number]`)\n\
             • `set announcement channel #channel`\n\
             • `set announcement link <message link>`\n\
             • `set announcement tag here|channel`\n\
             • `set announcement text <text>` (empty restores the default)\n\
             • `set auto-add on|off`\n\
             • `show settings`",
        );
    }
    text
}
