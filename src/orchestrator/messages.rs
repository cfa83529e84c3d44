//! User-facing text posted by the lifecycle.

use super::calendar::month_name;

/// Slack mention markup for a user.
#[must_use]
pub fn mention(user: &str) -> String {
    format!("<@{user}>")
}

/// Space-separated mentions for `users`.
#[must_use]
pub fn mentions(users: &[String]) -> String {
    users
        .iter()
        .map(|user| mention(user))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Slack channel link markup.
#[must_use]
pub fn channel_link(channel_id: &str) -> String {
    format!("<#{channel_id}>")
}

/// Signup announcement for `month`; `custom` replaces the default body.
#[must_use]
pub fn announcement(
    tag_mention: &str,
    custom: &str,
    year: i32,
    month: u32,
    daily: &str,
    weekly: &str,
) -> String {
    let custom = custom.trim();
    if !custom.is_empty() {
        return format!("{tag_mention} {custom}");
    }
    let month = month_name(month);
    format!(
        "{tag_mention} Sign-ups are open for the {month} {year} check-in groups! \
         React with :{daily}: if you plan to check in daily, or :{weekly}: if you \
         plan to check in weekly. Groups are formed on the last day of the month."
    )
}

/// First message in a new group channel; its thread collects introductions.
#[must_use]
pub fn welcome(channel_name: &str, year: i32, month: u32, members: &[String]) -> String {
    format!(
        "Welcome to #{channel_name}, your check-in group for {} {year}! \
         Introduce yourself in this thread, then post your check-ins as top-level \
         messages in the channel.\n{}",
        month_name(month),
        mentions(members)
    )
}

/// Batched greeting for members added after the groups were formed.
#[must_use]
pub fn late_welcome(members: &[String]) -> String {
    format!(
        "Please welcome {} to the group! Introduce yourself in the welcome thread \
         at the top of the channel.",
        mentions(members)
    )
}

/// Reminder for a member who has not posted at all.
#[must_use]
pub fn no_post_reminder(channel_id: &str) -> String {
    format!(
        "Hi! You signed up for {} this month but haven't posted yet. Share a \
         check-in soon; members who haven't posted by the 11th are removed from \
         the group.",
        channel_link(channel_id)
    )
}

/// Reminder for a member who only introduced themselves.
#[must_use]
pub fn intro_only_reminder(channel_id: &str) -> String {
    format!(
        "Thanks for introducing yourself in {}! Remember to post your check-ins as \
         top-level messages in the channel; replies in the intro thread don't count.",
        channel_link(channel_id)
    )
}

/// Notice sent to a member removed for inactivity.
#[must_use]
pub fn removal_notice(channel_id: &str) -> String {
    format!(
        "You've been removed from {} because you didn't post this month. You're \
         welcome to sign up again when next month's announcement goes out.",
        channel_link(channel_id)
    )
}

/// Extra guidance appended when Slack refuses channel management.
pub const RESTRICTED_ACTION_HINT: &str = "Slack refused the request with `restricted_action`. \
     Check the workspace's channel management permissions and allow members (or \
     the app) to create private channels and invite people.";
