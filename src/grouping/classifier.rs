//! Participation classification for one check-in channel.
//!
//! Members who posted at the top level (or broadcast a thread reply) are
//! participating, whatever the message subtype (file shares, `/me`
//! messages). Join/leave notices and bot-integration posts are ignored.
//! Members whose only activity is a reply in the welcome thread are
//! "intro only". Everyone else has not posted.

use std::collections::BTreeSet;

use crate::models::message::{ChannelMessage, MessageSubtype};

/// Prefix of the welcome message the bot posts into every new group channel.
pub const WELCOME_PREFIX: &str = "Welcome to";

/// Members sorted by how they have participated so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Members with no activity at all.
    pub no_post: Vec<String>,
    /// Members who only replied to the welcome thread.
    pub intro_only: Vec<String>,
}

impl Classification {
    /// Whether there is nobody to remind or remove.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.no_post.is_empty() && self.intro_only.is_empty()
    }

    /// Drop `exempt` users (admins, the bot) from both lists.
    #[must_use]
    pub fn without(mut self, exempt: &BTreeSet<String>) -> Self {
        self.no_post.retain(|user| !exempt.contains(user));
        self.intro_only.retain(|user| !exempt.contains(user));
        self
    }
}

/// The oldest top-level message that starts with [`WELCOME_PREFIX`].
#[must_use]
pub fn find_welcome(history: &[ChannelMessage]) -> Option<&ChannelMessage> {
    history
        .iter()
        .filter(|msg| !msg.is_thread_reply() && !msg.is_membership_event())
        .filter(|msg| msg.text.trim_start().starts_with(WELCOME_PREFIX))
        .min_by(|a, b| {
            a.timestamp()
                .cmp(&b.timestamp())
                .then_with(|| a.ts.cmp(&b.ts))
        })
}

/// Classify `members` from the channel history merged with the welcome
/// thread's replies.
#[must_use]
pub fn classify(members: &[String], history: &[ChannelMessage]) -> Classification {
    let welcome_ts = find_welcome(history).map(|msg| msg.ts.as_str());

    let mut posted: BTreeSet<&str> = BTreeSet::new();
    let mut thread_only: BTreeSet<&str> = BTreeSet::new();

    for msg in history {
        if msg.subtype.as_ref().is_some_and(MessageSubtype::is_ignored) {
            continue;
        }
        let Some(author) = msg.author.as_deref() else {
            continue;
        };

        if msg.is_channel_post() {
            posted.insert(author);
        } else if welcome_ts.is_some() && msg.thread_ts.as_deref() == welcome_ts {
            thread_only.insert(author);
        }
    }

    thread_only.retain(|user| !posted.contains(user));

    let no_post = members
        .iter()
        .filter(|m| !posted.contains(m.as_str()) && !thread_only.contains(m.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let intro_only = members
        .iter()
        .filter(|m| thread_only.contains(m.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Classification {
        no_post,
        intro_only,
    }
}
