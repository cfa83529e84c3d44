//! Day-of-month triggers in the reference timezone.
//!
//! The lifecycle runs on a fixed UTC offset (no daylight saving), so a
//! given instant always maps to the same calendar date regardless of
//! where the server runs.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, Timelike, Utc};

use crate::{AppError, Result};

/// Day the signup announcement is posted.
pub const ANNOUNCEMENT_DAY: u32 = 25;
/// Last day on which late reactions are absorbed into existing groups.
pub const LATE_SIGNUP_LAST_DAY: u32 = 2;
/// Day inactive members are reminded.
pub const REMINDER_DAY: u32 = 7;
/// Day members who never posted are removed.
pub const REMOVAL_DAY: u32 = 11;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One batch action of the monthly lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Post next month's signup announcement.
    Announce,
    /// Form next month's groups from announcement reactions.
    CreateGroups,
    /// Place users who reacted after the groups were formed.
    AbsorbLateSignups,
    /// DM members who have not posted yet.
    RemindInactive,
    /// Remove members who never posted.
    RemoveInactive,
}

impl LifecycleStep {
    /// Short name used in logs and admin notices.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Announce => "announcement",
            Self::CreateGroups => "group creation",
            Self::AbsorbLateSignups => "late signups",
            Self::RemindInactive => "reminders",
            Self::RemoveInactive => "removals",
        }
    }
}

impl Display for LifecycleStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed offset for `hours` east of UTC (negative for west).
///
/// # Errors
///
/// Returns `AppError::Config` if the offset is out of range.
pub fn reference_offset(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| AppError::Config(format!("invalid utc offset: {hours} hours")))
}

/// Calendar date of `now` in the reference timezone.
#[must_use]
pub fn reference_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Hour of day of `now` in the reference timezone.
#[must_use]
pub fn reference_hour(now: DateTime<Utc>, offset: FixedOffset) -> u32 {
    now.with_timezone(&offset).hour()
}

/// Whether `date` is the final day of its month.
#[must_use]
pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}

/// Year and month following `date`'s month.
#[must_use]
pub fn next_month(date: NaiveDate) -> (i32, u32) {
    let first = date.with_day(1).unwrap_or(date);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    (next.year(), next.month())
}

/// English month name for `month` (1-12).
#[must_use]
pub fn month_name(month: u32) -> &'static str {
    usize::try_from(month)
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|idx| MONTH_NAMES.get(idx))
        .copied()
        .unwrap_or("Unknown")
}

/// Steps due on `date`, in execution order.
#[must_use]
pub fn steps_for(date: NaiveDate) -> Vec<LifecycleStep> {
    let mut steps = Vec::new();
    match date.day() {
        ANNOUNCEMENT_DAY => steps.push(LifecycleStep::Announce),
        1..=LATE_SIGNUP_LAST_DAY => steps.push(LifecycleStep::AbsorbLateSignups),
        REMINDER_DAY => steps.push(LifecycleStep::RemindInactive),
        REMOVAL_DAY => steps.push(LifecycleStep::RemoveInactive),
        _ => {}
    }
    if is_last_day_of_month(date) {
        steps.push(LifecycleStep::CreateGroups);
    }
    steps
}
