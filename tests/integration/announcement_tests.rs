//! Monthly signup announcement.

use chrono::{FixedOffset, NaiveDate};

use checkin_bot::models::workspace::{AnnouncementRef, AnnouncementTag};
use checkin_bot::orchestrator::announcement::{post_announcement, AnnouncementOutcome};
use checkin_bot::AppError;

use super::test_helpers::{
    configured_workspace, stored_context, test_repo, test_settings, FakeGateway, ANNOUNCE_CHANNEL,
    TEAM,
};

fn feb_25() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 25).unwrap()
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[tokio::test]
async fn posts_seeds_reactions_and_records_the_message() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.last_announcement = None;
    config.announcement_tag = AnnouncementTag::Channel;
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();

    let outcome = post_announcement(&gateway, &repo, &test_settings(), &ctx, feb_25(), utc())
        .await
        .expect("announcement posted");

    let AnnouncementOutcome::Posted(posted) = outcome else {
        panic!("expected a new announcement");
    };
    let posts = gateway.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel, ANNOUNCE_CHANNEL);
    assert!(posts[0].text.starts_with("<!channel>"));
    assert!(posts[0].text.contains("March 2025"));

    let seeded: Vec<String> = gateway
        .reactions_added()
        .into_iter()
        .map(|(_, ts, name)| {
            assert_eq!(ts, posted.ts);
            name
        })
        .collect();
    assert_eq!(seeded, vec!["sunny".to_owned(), "calendar".to_owned()]);

    let stored = repo.get(TEAM).await.unwrap().unwrap();
    assert_eq!(stored.last_announcement, Some(posted));
    assert_eq!(gateway.dms_to("M").len(), 1);
}

#[tokio::test]
async fn custom_text_replaces_the_default_body() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.last_announcement = None;
    config.custom_announcement_text = "Groups are back, react below!".to_owned();
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();

    post_announcement(&gateway, &repo, &test_settings(), &ctx, feb_25(), utc())
        .await
        .unwrap();

    assert_eq!(gateway.posts()[0].text, "<!here> Groups are back, react below!");
}

#[tokio::test]
async fn second_run_on_the_same_date_does_not_repost() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    // 2025-02-25 10:00 UTC.
    config.last_announcement = Some(AnnouncementRef {
        channel: ANNOUNCE_CHANNEL.to_owned(),
        ts: "1740477600.000100".to_owned(),
    });
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();

    let outcome = post_announcement(&gateway, &repo, &test_settings(), &ctx, feb_25(), utc())
        .await
        .unwrap();

    assert_eq!(outcome, AnnouncementOutcome::AlreadyPosted);
    assert!(gateway.posts().is_empty());
}

#[tokio::test]
async fn missing_channel_tells_admins_and_posts_nothing() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.announcement_channel = None;
    let ctx = stored_context(&repo, config).await;
    let gateway = FakeGateway::new();

    let err = post_announcement(&gateway, &repo, &test_settings(), &ctx, feb_25(), utc())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
    assert!(gateway.posts().is_empty());
    assert!(gateway.dms_to("M")[0].contains("set announcement channel"));
}
