//! Balanced partitioning of opted-in users into check-in groups.
//!
//! Users named in an incompatibility pair are seeded first so that the two
//! sides always land in different groups; everyone else fills the smallest
//! group. Daily posters are placed before weekly posters so the daily crowd
//! spreads evenly across channels.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::models::participation::{Group, ParticipantPool};
use crate::models::workspace::IncompatiblePair;
use crate::{AppError, Result};

/// Default number of participants per group.
pub const DEFAULT_TARGET_GROUP_SIZE: usize = 11;

struct Placement<'a> {
    groups: Vec<Vec<String>>,
    assigned: HashMap<String, usize>,
    pairs: Vec<&'a IncompatiblePair>,
}

impl<'a> Placement<'a> {
    fn new(pairs: Vec<&'a IncompatiblePair>) -> Self {
        Self {
            groups: vec![Vec::new()],
            assigned: HashMap::new(),
            pairs,
        }
    }

    fn conflicts(&self, user: &str, group: usize) -> bool {
        self.pairs
            .iter()
            .filter_map(|pair| pair.counterpart(user))
            .any(|other| self.assigned.get(other) == Some(&group))
    }

    fn push(&mut self, user: &str, group: usize) {
        self.groups[group].push(user.to_owned());
        self.assigned.insert(user.to_owned(), group);
    }

    /// Lowest-index group free of `user`'s counterparts, opening a new one
    /// when every existing group conflicts.
    fn place_constrained(&mut self, user: &str) {
        if self.assigned.contains_key(user) {
            return;
        }
        let target = (0..self.groups.len())
            .find(|&idx| !self.conflicts(user, idx))
            .unwrap_or_else(|| {
                self.groups.push(Vec::new());
                self.groups.len() - 1
            });
        self.push(user, target);
    }

    /// Smallest group, ties going to the lowest index.
    fn place_balanced(&mut self, user: &str) {
        if self.assigned.contains_key(user) {
            return;
        }
        let target = self
            .groups
            .iter()
            .enumerate()
            .min_by_key(|(idx, members)| (members.len(), *idx))
            .map_or(0, |(idx, _)| idx);
        self.push(user, target);
    }
}

/// Partition the participant pool into groups, injecting one admin each.
///
/// # Errors
///
/// Returns `AppError::Config` when `admins` is empty or
/// `target_group_size` is zero.
pub fn partition(
    pool: &ParticipantPool,
    pairs: &BTreeSet<IncompatiblePair>,
    admins: &[String],
    target_group_size: usize,
) -> Result<Vec<Group>> {
    if admins.is_empty() {
        return Err(AppError::Config(
            "at least one admin is required to form groups".into(),
        ));
    }
    if target_group_size == 0 {
        return Err(AppError::Config("target group size must be positive".into()));
    }

    let weekly: BTreeSet<&String> = pool
        .weekly
        .iter()
        .filter(|u| !admins.contains(u))
        .collect();
    let daily: BTreeSet<&String> = pool
        .daily
        .iter()
        .filter(|u| !admins.contains(u) && !weekly.contains(u))
        .collect();
    let everyone: BTreeSet<&str> = daily
        .iter()
        .chain(weekly.iter())
        .map(|u| u.as_str())
        .collect();

    let active_pairs: Vec<&IncompatiblePair> = pairs
        .iter()
        .filter(|pair| everyone.contains(pair.first()) && everyone.contains(pair.second()))
        .collect();

    let mut placement = Placement::new(active_pairs.clone());
    for pair in &active_pairs {
        placement.place_constrained(pair.first());
        placement.place_constrained(pair.second());
    }

    let desired = placement.groups.len().max(everyone.len() / target_group_size);
    placement.groups.resize_with(desired, Vec::new);

    for user in daily.iter().chain(weekly.iter()) {
        placement.place_balanced(user);
    }

    let groups: Vec<Group> = placement
        .groups
        .into_iter()
        .enumerate()
        .map(|(idx, members)| Group {
            number: idx + 1,
            members,
            admin: admins[idx % admins.len()].clone(),
        })
        .collect();

    debug!(
        participants = everyone.len(),
        groups = groups.len(),
        constrained_pairs = active_pairs.len(),
        "partitioned participants"
    );
    Ok(groups)
}
