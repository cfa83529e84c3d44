//! Date-driven dispatch of lifecycle steps for one workspace.

use chrono::NaiveDate;

use checkin_bot::orchestrator::calendar::LifecycleStep;
use checkin_bot::orchestrator::lifecycle::{Lifecycle, StepOutcome};
use checkin_bot::orchestrator::announcement::AnnouncementOutcome;
use checkin_bot::AppError;

use super::test_helpers::{
    configured_workspace, test_repo, test_settings, FakeGateway, ANNOUNCE_CHANNEL, TEAM,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn quiet_day_touches_nothing() {
    let repo = test_repo().await;
    let settings = test_settings();
    let gateway = FakeGateway::new();
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    let run = lifecycle.run(TEAM, date(2025, 3, 15)).await.unwrap();

    assert!(run.steps.is_empty());
    assert!(run.is_clean());
    assert!(repo.get(TEAM).await.unwrap().is_none(), "no record created");
}

#[tokio::test]
async fn announcement_day_posts_and_records() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.last_announcement = None;
    repo.save(&config).await.unwrap();
    let settings = test_settings();
    let gateway = FakeGateway::new();
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    let run = lifecycle.run(TEAM, date(2025, 2, 25)).await.unwrap();

    assert_eq!(run.steps.len(), 1);
    let (step, result) = &run.steps[0];
    assert_eq!(*step, LifecycleStep::Announce);
    assert!(matches!(
        result,
        Ok(StepOutcome::Announcement(AnnouncementOutcome::Posted(_)))
    ));
    assert_eq!(gateway.posts()[0].channel, ANNOUNCE_CHANNEL);
    let stored = repo.get(TEAM).await.unwrap().unwrap();
    assert!(stored.last_announcement.is_some());
}

#[tokio::test]
async fn first_contact_creates_the_workspace_record() {
    let repo = test_repo().await;
    let settings = test_settings();
    let gateway = FakeGateway::new();
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    let run = lifecycle.run(TEAM, date(2025, 2, 25)).await.unwrap();

    let stored = repo.get(TEAM).await.unwrap().expect("record created");
    assert_eq!(stored.team_name, "Test Team");
    // No announcement channel yet: the step is skipped, not failed loudly.
    assert!(matches!(run.steps[0].1, Err(AppError::Config(_))));
    assert!(!run.is_clean());
}

#[tokio::test]
async fn configuration_problems_are_not_reported_twice() {
    let repo = test_repo().await;
    let mut config = configured_workspace();
    config.announcement_channel = None;
    repo.save(&config).await.unwrap();
    let settings = test_settings();
    let gateway = FakeGateway::new();
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    lifecycle.run(TEAM, date(2025, 2, 25)).await.unwrap();

    let notices = gateway.dms_to("M");
    assert_eq!(notices.len(), 1);
    assert!(!notices[0].contains("step failed"));
}

#[tokio::test]
async fn gateway_failure_is_reported_to_admins() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let settings = test_settings();
    let gateway = FakeGateway::new();
    gateway.fail("conversations.list");
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    let run = lifecycle.run(TEAM, date(2025, 3, 11)).await.unwrap();

    assert_eq!(run.steps[0].0, LifecycleStep::RemoveInactive);
    assert!(matches!(run.steps[0].1, Err(AppError::Slack(_))));
    assert!(gateway.dms_to("M")[0].contains("The removals step failed"));
}

#[tokio::test]
async fn bot_identity_failure_aborts_the_run() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let settings = test_settings();
    let gateway = FakeGateway::new();
    gateway.fail("auth.test");
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    let err = lifecycle.run(TEAM, date(2025, 3, 7)).await.unwrap_err();

    assert!(matches!(err, AppError::Slack(_)));
    assert!(gateway.posts().is_empty());
    let notices = gateway.dms_to("M");
    assert_eq!(notices.len(), 1, "admins hear about the aborted run");
    assert!(notices[0].contains("stopped early"));
}

#[tokio::test]
async fn last_day_runs_group_creation() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let settings = test_settings();
    let gateway = FakeGateway::new();
    let lifecycle = Lifecycle::new(&gateway, &repo, &settings).unwrap();

    let run = lifecycle.run(TEAM, date(2025, 4, 30)).await.unwrap();

    let steps: Vec<LifecycleStep> = run.steps.iter().map(|(step, _)| *step).collect();
    assert_eq!(steps, vec![LifecycleStep::CreateGroups]);
    assert!(run.is_clean(), "no reactions is a clean outcome");
}
