//! Group formation from announcement reactions.

use chrono::{FixedOffset, NaiveDate};

use checkin_bot::models::message::{ChannelMessage, MessageSubtype};
use checkin_bot::orchestrator::group_creation::{create_groups, GroupCreationOutcome};
use checkin_bot::AppError;

use super::test_helpers::{
    configured_workspace, stored_context, test_repo, test_settings, FakeGateway, ANNOUNCE_CHANNEL,
    ANNOUNCE_TS,
};

fn feb_28() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[tokio::test]
async fn incompatible_users_land_in_different_groups() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config
        .incompatible_pairs
        .insert(checkin_bot::models::workspace::IncompatiblePair::new("A", "D").unwrap());
    let ctx = stored_context(&repo, config).await;

    let gateway = FakeGateway::new();
    gateway.set_reactions(
        ANNOUNCE_CHANNEL,
        ANNOUNCE_TS,
        &[("sunny", &["A", "B", "C"]), ("calendar", &["D"])],
    );

    let outcome = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .expect("groups formed");

    let GroupCreationOutcome::Formed { groups, failures } = outcome else {
        panic!("expected groups to be formed");
    };
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    assert_eq!(groups.len(), 2);
    assert_eq!(
        gateway.created(),
        vec!["check-ins-2025-03-1".to_owned(), "check-ins-2025-03-2".to_owned()]
    );

    let a_group = groups.iter().find(|g| g.members.contains(&"A".to_owned())).unwrap();
    let d_group = groups.iter().find(|g| g.members.contains(&"D".to_owned())).unwrap();
    assert_ne!(a_group.channel_id, d_group.channel_id);

    for group in &groups {
        assert!(gateway.invited_to(&group.channel_id).contains("M"));
    }
    let participants: std::collections::BTreeSet<String> = gateway
        .invites()
        .into_iter()
        .map(|(_, user)| user)
        .filter(|user| user != "M")
        .collect();
    assert_eq!(participants.len(), 4);

    let welcomes = gateway
        .posts()
        .into_iter()
        .filter(|post| post.text.starts_with("Welcome to"))
        .count();
    assert_eq!(welcomes, 2);
    assert_eq!(gateway.dms_to("M").len(), 1, "admin gets one summary");
}

#[tokio::test]
async fn no_reactions_creates_nothing() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();

    let outcome = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .expect("step completes");

    assert_eq!(outcome, GroupCreationOutcome::NoReactions);
    assert!(gateway.created().is_empty());
    assert!(gateway.invites().is_empty());
    let notices = gateway.dms_to("M");
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("No reactions found"));
}

#[tokio::test]
async fn missing_channel_format_is_reported_to_admins() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.channel_format = None;
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();

    let err = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("channel format")));
    assert!(gateway.created().is_empty());
    assert!(gateway.dms_to("M")[0].contains("couldn't create the March 2025"));
}

#[tokio::test]
async fn existing_month_channels_block_a_second_run() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();
    gateway.add_channel("C1", "check-ins-2025-03-1", &["A"]);
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["A"])]);

    let err = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
    assert!(gateway.created().is_empty());
    assert!(gateway.invites().is_empty());
    assert!(gateway.posts().is_empty(), "no welcome is reposted");
    assert!(gateway.dms_to("M")[0].contains("#check-ins-2025-03-1"));
}

#[tokio::test]
async fn members_already_in_the_channel_are_not_failures() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["A", "B"])]);
    gateway.fail_invite_of("M", "already_in_channel");

    let outcome = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .expect("groups formed");

    let GroupCreationOutcome::Formed { groups, failures } = outcome else {
        panic!("expected groups to be formed");
    };
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    assert_eq!(groups.len(), 1);
    assert_eq!(gateway.created(), vec!["check-ins-2025-03".to_owned()]);
    assert_eq!(gateway.posts().len(), 1, "one welcome per new channel");
    assert!(groups[0].members.contains(&"M".to_owned()));
}

#[tokio::test]
async fn restricted_workspace_failure_carries_the_permission_hint() {
    let repo = test_repo().await;
    let ctx = stored_context(&repo, configured_workspace()).await;
    let gateway = FakeGateway::new();
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["A", "B"])]);
    gateway.fail_creates_with("restricted_action");

    let outcome = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .expect("step completes with failures");

    let GroupCreationOutcome::Formed { groups, failures } = outcome else {
        panic!("expected a formed outcome");
    };
    assert!(groups.is_empty());
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("channel management permissions"));
    assert!(gateway.invites().is_empty());
}

#[tokio::test]
async fn always_included_and_recently_active_users_join_as_weekly() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.auto_add_active_users = true;
    config.always_include_users.insert("Z".to_owned());
    let ctx = stored_context(&repo, config).await;

    let gateway = FakeGateway::new();
    gateway.set_reactions(ANNOUNCE_CHANNEL, ANNOUNCE_TS, &[("sunny", &["A"])]);
    gateway.add_channel("C_FEB", "check-ins-2025-02", &["A", "Y"]);
    // 2025-02-27 12:00 UTC, inside the default seven-day lookback.
    gateway.set_history(
        "C_FEB",
        vec![
            ChannelMessage::top_level("Y", "1740657600.000100", "shipped the thing"),
            ChannelMessage::top_level("W", "1740657650.000100", "demo recording")
                .with_subtype(MessageSubtype::Other("file_share".into())),
            ChannelMessage::top_level(super::test_helpers::BOT, "1740657700.000100", "bot chatter"),
        ],
    );

    let outcome = create_groups(&gateway, &test_settings(), &ctx, feb_28(), utc())
        .await
        .expect("groups formed");

    let GroupCreationOutcome::Formed { groups, .. } = outcome else {
        panic!("expected groups to be formed");
    };
    assert_eq!(groups.len(), 1);
    assert_eq!(gateway.created(), vec!["check-ins-2025-03".to_owned()]);
    let invited = gateway.invited_to(&groups[0].channel_id);
    for user in ["A", "Y", "W", "Z", "M"] {
        assert!(invited.contains(user), "{user} should be invited");
    }
    assert!(!invited.contains(super::test_helpers::BOT));
}
