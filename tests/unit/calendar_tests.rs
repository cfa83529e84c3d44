use chrono::{NaiveDate, TimeZone, Utc};

use checkin_bot::orchestrator::calendar::{
    month_name, next_month, reference_date, reference_hour, reference_offset, steps_for,
    LifecycleStep,
};
use checkin_bot::orchestrator::scheduler::due_date;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn steps_follow_the_day_of_month() {
    assert_eq!(steps_for(date(2025, 2, 25)), vec![LifecycleStep::Announce]);
    assert_eq!(steps_for(date(2025, 3, 1)), vec![LifecycleStep::AbsorbLateSignups]);
    assert_eq!(steps_for(date(2025, 3, 2)), vec![LifecycleStep::AbsorbLateSignups]);
    assert_eq!(steps_for(date(2025, 3, 7)), vec![LifecycleStep::RemindInactive]);
    assert_eq!(steps_for(date(2025, 3, 11)), vec![LifecycleStep::RemoveInactive]);
    assert_eq!(steps_for(date(2025, 3, 31)), vec![LifecycleStep::CreateGroups]);
    assert!(steps_for(date(2025, 3, 3)).is_empty());
    assert!(steps_for(date(2025, 3, 30)).is_empty());
}

#[test]
fn month_boundaries() {
    assert_eq!(steps_for(date(2025, 2, 28)), vec![LifecycleStep::CreateGroups]);
    assert!(steps_for(date(2024, 2, 28)).is_empty());
    assert_eq!(next_month(date(2025, 1, 31)), (2025, 2));
    assert_eq!(month_name(3), "March");
    assert_eq!(month_name(13), "Unknown");
}

#[test]
fn reference_date_uses_the_fixed_offset() {
    let pacific = reference_offset(-8).unwrap();
    // 2025-03-01 05:00 UTC is still February 28 on UTC-8.
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 5, 0, 0).unwrap();
    assert_eq!(reference_date(now, pacific), date(2025, 2, 28));
    assert_eq!(reference_hour(now, pacific), 21);
    assert!(reference_offset(30).is_err());
}

#[test]
fn scheduler_fires_once_per_date_after_the_run_hour() {
    let utc = reference_offset(0).unwrap();
    let morning = Utc.with_ymd_and_hms(2025, 3, 7, 8, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap();

    assert_eq!(due_date(morning, utc, 9, None), None);
    assert_eq!(due_date(later, utc, 9, None), Some(date(2025, 3, 7)));
    assert_eq!(due_date(later, utc, 9, Some(date(2025, 3, 7))), None);
    assert_eq!(
        due_date(later, utc, 9, Some(date(2025, 3, 6))),
        Some(date(2025, 3, 7))
    );
}
