//! Late reactors joining this month's groups.

use chrono::NaiveDate;

use checkin_bot::models::workspace::IncompatiblePair;
use checkin_bot::orchestrator::late_signup::absorb_late_signups;

use super::test_helpers::{
    configured_workspace, stored_context, test_repo, test_settings, FakeGateway, ANNOUNCE_CHANNEL,
    ANNOUNCE_TS,
};

fn march_1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

#[tokio::test]
async fn late_reactor_joins_the_smallest_group() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();
    gateway.add_channel("C1", "check-ins-2025-03-1", &["A", "B", "C", "M"]);
    gateway.add_channel("C2", "check-ins-2025-03-2", &["D", "M"]);
    gateway.set_reactions(
        ANNOUNCE_CHANNEL,
        ANNOUNCE_TS,
        &[("sunny", &["A", "B", "C", "E"]), ("calendar", &["D", "M"])],
    );

    let report = absorb_late_signups(&gateway, &test_settings(), &ctx, march_1())
        .await
        .expect("late signups absorbed");

    assert_eq!(report.placed.get("C2"), Some(&vec!["E".to_owned()]));
    assert!(report.unplaceable.is_empty());
    assert_eq!(gateway.invites(), vec![("C2".to_owned(), "E".to_owned())]);
    let welcomes = gateway.posts();
    assert_eq!(welcomes.len(), 1);
    assert_eq!(welcomes[0].channel, "C2");
    assert!(welcomes[0].text.contains("<@E>"));
    assert_eq!(gateway.dms_to("M").len(), 1);
}

#[tokio::test]
async fn incompatibility_steers_placement() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config
        .incompatible_pairs
        .insert(IncompatiblePair::new("D", "E").unwrap());
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();
    gateway.add_channel("C1", "check-ins-2025-03-1", &["A", "B", "C"]);
    gateway.add_channel("C2", "check-ins-2025-03-2", &["D"]);
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["E"])]);

    let report = absorb_late_signups(&gateway, &test_settings(), &ctx, march_1())
        .await
        .unwrap();

    assert_eq!(report.placed.get("C1"), Some(&vec!["E".to_owned()]));
}

#[tokio::test]
async fn user_in_conflict_with_every_group_is_reported() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config
        .incompatible_pairs
        .insert(IncompatiblePair::new("A", "E").unwrap());
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();
    gateway.add_channel("C1", "check-ins-2025-03", &["A"]);
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["E"])]);

    let report = absorb_late_signups(&gateway, &test_settings(), &ctx, march_1())
        .await
        .unwrap();

    assert_eq!(report.unplaceable, vec!["E".to_owned()]);
    assert!(gateway.invites().is_empty());
    assert!(gateway.dms_to("M")[0].contains("couldn't place <@E>"));
}

#[tokio::test]
async fn quiet_when_everyone_is_already_placed() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();
    gateway.add_channel("C1", "check-ins-2025-03", &["A", "M"]);
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["A"])]);

    let report = absorb_late_signups(&gateway, &test_settings(), &ctx, march_1())
        .await
        .unwrap();

    assert!(report.is_quiet());
    assert!(gateway.posts().is_empty());
    assert!(gateway.dms().is_empty());
}

#[tokio::test]
async fn failed_invite_is_collected_not_fatal() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();
    gateway.add_channel("C1", "check-ins-2025-03", &["A"]);
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["A", "E", "F"])]);
    gateway.fail_invite_of("E", "user_is_restricted");

    let report = absorb_late_signups(&gateway, &test_settings(), &ctx, march_1())
        .await
        .unwrap();

    assert_eq!(report.placed.get("C1"), Some(&vec!["F".to_owned()]));
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("<@E>"));
}
