//! Signup reactions, the monthly participant pool, and formed groups.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::message::Reaction;

/// Users who opted in through the announcement reactions.
///
/// A user who reacted with both emoji is recorded as weekly only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet {
    /// Daily-emoji reactors.
    pub daily: BTreeSet<String>,
    /// Weekly-emoji reactors.
    pub weekly: BTreeSet<String>,
}

impl ReactionSet {
    /// Collect the two opt-in sets from a message's reactions.
    #[must_use]
    pub fn from_reactions(reactions: &[Reaction], daily_name: &str, weekly_name: &str) -> Self {
        let mut set = Self::default();
        for reaction in reactions {
            if reaction.name == weekly_name {
                set.weekly.extend(reaction.users.iter().cloned());
            } else if reaction.name == daily_name {
                set.daily.extend(reaction.users.iter().cloned());
            }
        }
        set.daily.retain(|user| !set.weekly.contains(user));
        set
    }

    /// Whether nobody reacted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.weekly.is_empty()
    }

    /// Every reacting user.
    #[must_use]
    pub fn all_users(&self) -> BTreeSet<String> {
        self.daily.union(&self.weekly).cloned().collect()
    }
}

/// Everyone to be placed into next month's groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantPool {
    /// Daily posters.
    pub daily: BTreeSet<String>,
    /// Weekly posters, including always-include and auto-added users.
    pub weekly: BTreeSet<String>,
}

impl ParticipantPool {
    /// Pool seeded from reactions.
    #[must_use]
    pub fn from_reactions(reactions: &ReactionSet) -> Self {
        Self {
            daily: reactions.daily.clone(),
            weekly: reactions.weekly.clone(),
        }
    }

    /// Add `user` as weekly unless already assigned. Returns whether added.
    pub fn add_weekly_if_absent(&mut self, user: &str) -> bool {
        if self.contains(user) {
            return false;
        }
        self.weekly.insert(user.to_owned())
    }

    /// Drop `user` from both sets.
    pub fn remove(&mut self, user: &str) {
        self.daily.remove(user);
        self.weekly.remove(user);
    }

    /// Whether `user` is in either set.
    #[must_use]
    pub fn contains(&self, user: &str) -> bool {
        self.daily.contains(user) || self.weekly.contains(user)
    }

    /// Number of distinct participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.daily.union(&self.weekly).count()
    }

    /// Whether the pool has nobody.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.weekly.is_empty()
    }
}

/// One check-in group bound for a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// 1-based group number in creation order.
    pub number: usize,
    /// Participants in placement order, admins excluded.
    pub members: Vec<String>,
    /// Admin injected into this group.
    pub admin: String,
}

impl Group {
    /// Participants followed by the admin.
    #[must_use]
    pub fn all_members(&self) -> Vec<String> {
        let mut all = self.members.clone();
        if !all.contains(&self.admin) {
            all.push(self.admin.clone());
        }
        all
    }

    /// Whether `user` is a participant or the admin of this group.
    #[must_use]
    pub fn contains(&self, user: &str) -> bool {
        self.admin == user || self.members.iter().any(|member| member == user)
    }
}
