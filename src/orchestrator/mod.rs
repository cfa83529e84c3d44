//! Monthly check-in lifecycle.
//!
//! Day-of-month dispatch, the five batch steps (announcement, group
//! creation, late signups, reminders, removals), admin notices, and the
//! hourly scheduler that drives them.

pub mod announcement;
pub mod calendar;
pub mod channels;
pub mod context;
pub mod group_creation;
pub mod late_signup;
pub mod lifecycle;
pub mod membership_review;
pub mod messages;
pub mod notify;
pub mod scheduler;
