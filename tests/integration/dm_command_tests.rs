//! Direct-message commands end to end: parse, authorize, execute, reply.

use chrono::{Duration, NaiveDate};

use checkin_bot::models::message::{ChannelMessage, MessageSubtype};
use checkin_bot::models::workspace::{AnnouncementTag, IncompatiblePair};
use checkin_bot::persistence::workspace_repo::WorkspaceRepo;
use checkin_bot::slack::commands;
use checkin_bot::slack::handlers::{execute, handle_direct_message, DirectMessage};
use checkin_bot::AppError;

use super::test_helpers::{configured_workspace, test_repo, FakeGateway, TEAM};

const DM_CHANNEL: &str = "D_USER";

fn dm<'a>(gateway: &'a FakeGateway, repo: &'a WorkspaceRepo, user_id: &'a str) -> DirectMessage<'a> {
    DirectMessage {
        gateway,
        repo,
        team_id: TEAM,
        user_id,
        channel_id: DM_CHANNEL,
        passcode_ttl: Duration::minutes(10),
        today: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
    }
}

async fn run(dm: &DirectMessage<'_>, text: &str) -> checkin_bot::Result<String> {
    execute(dm, commands::parse(text)?).await
}

#[tokio::test]
async fn king_me_then_passcode_grants_admin() {
    let repo = test_repo().await;
    let gateway = FakeGateway::new();
    let dm = dm(&gateway, &repo, "U1");

    let reply = run(&dm, "king me").await.unwrap();
    assert!(reply.contains("passcode"));

    let stored = repo.get(TEAM).await.unwrap().expect("record created");
    let code = stored.pending_admin_passcodes["U1"].code.clone();

    let reply = run(&dm, &code).await.unwrap();
    assert!(reply.contains("now a check-in admin"));
    let stored = repo.get(TEAM).await.unwrap().unwrap();
    assert!(stored.is_admin("U1"));
    assert!(stored.pending_admin_passcodes.is_empty());

    let err = run(&dm, &code).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "codes are single use");
}

#[tokio::test]
async fn wrong_passcode_is_rejected() {
    let repo = test_repo().await;
    let gateway = FakeGateway::new();
    let dm = dm(&gateway, &repo, "U1");
    run(&dm, "king me").await.unwrap();

    let stored = repo.get(TEAM).await.unwrap().unwrap();
    let code = &stored.pending_admin_passcodes["U1"].code;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    assert!(run(&dm, wrong).await.is_err());
    assert!(!repo.get(TEAM).await.unwrap().unwrap().is_admin("U1"));
}

#[tokio::test]
async fn settings_commands_require_admin() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();

    let err = run(&dm(&gateway, &repo, "U_NOBODY"), "set auto-add on")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
    assert!(!repo.get(TEAM).await.unwrap().unwrap().auto_add_active_users);
}

#[tokio::test]
async fn admin_updates_every_setting() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();
    gateway.add_channel("CGENERAL", "general", &[]);
    let admin = dm(&gateway, &repo, "M");

    run(&admin, "keep apart <@UA> <@UB>").await.unwrap();
    run(&admin, "always include <@UC> <@UD>").await.unwrap();
    run(&admin, "remove from always include <@UD>").await.unwrap();
    let reply = run(&admin, "set channel format Check Ins [year] [month]")
        .await
        .unwrap();
    assert!(reply.contains("check-ins-2025-03-1"));
    run(&admin, "set announcement channel #general").await.unwrap();
    run(&admin, "set announcement tag channel").await.unwrap();
    run(&admin, "set announcement text React to join!").await.unwrap();
    run(&admin, "set auto-add on").await.unwrap();
    run(
        &admin,
        "set announcement link <https://acme.slack.com/archives/CGENERAL/p1740477600000100>",
    )
    .await
    .unwrap();

    let stored = repo.get(TEAM).await.unwrap().unwrap();
    assert!(stored
        .incompatible_pairs
        .contains(&IncompatiblePair::new("UB", "UA").unwrap()));
    assert!(stored.always_include_users.contains("UC"));
    assert!(!stored.always_include_users.contains("UD"));
    assert_eq!(stored.channel_format.as_deref(), Some("check-ins-[year]-[month]"));
    assert_eq!(stored.announcement_channel.as_deref(), Some("CGENERAL"));
    assert_eq!(stored.announcement_tag, AnnouncementTag::Channel);
    assert_eq!(stored.custom_announcement_text, "React to join!");
    assert!(stored.auto_add_active_users);
    let announcement = stored.last_announcement.unwrap();
    assert_eq!(announcement.channel, "CGENERAL");
    assert_eq!(announcement.ts, "1740477600.000100");

    let settings = run(&admin, "show settings").await.unwrap();
    assert!(settings.contains("<#CGENERAL>"));
    assert!(settings.contains("<@UA> / <@UB>"));
}

#[tokio::test]
async fn invalid_channel_format_is_not_stored() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();

    let err = run(&dm(&gateway, &repo, "M"), "set channel format groups-[month]")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    let stored = repo.get(TEAM).await.unwrap().unwrap();
    assert_eq!(stored.channel_format.as_deref(), Some("check-ins-[year]-[month]"));
}

#[tokio::test]
async fn unknown_text_gets_role_specific_help() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();

    let member_help = run(&dm(&gateway, &repo, "U1"), "what can you do?").await.unwrap();
    let admin_help = run(&dm(&gateway, &repo, "M"), "hello").await.unwrap();

    assert!(!member_help.contains("Admin commands"));
    assert!(admin_help.contains("Admin commands"));
}

#[tokio::test]
async fn replies_are_posted_back_into_the_dm() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();

    handle_direct_message(&dm(&gateway, &repo, "U1"), "set auto-add on").await;

    let posts = gateway.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel, DM_CHANNEL);
    assert!(posts[0].text.starts_with("Only check-in admins"));
}

#[tokio::test]
async fn export_uploads_only_the_senders_channel_messages() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();
    gateway.add_channel("CFEB", "check-ins-2025-02", &["U1", "U2"]);
    gateway.set_history(
        "CFEB",
        vec![
            ChannelMessage::top_level("U1", "1738500000.000100", "second"),
            ChannelMessage::top_level("U1", "1738400000.000100", "first"),
            ChannelMessage::top_level("U2", "1738450000.000100", "not mine"),
            ChannelMessage::reply("U1", "1738460000.000100", "1738400000.000100", "side chat"),
            ChannelMessage::reply("U1", "1738470000.000100", "1738400000.000100", "broadcast")
                .with_subtype(MessageSubtype::ThreadBroadcast),
            ChannelMessage::top_level("U1", "1738300000.000100", "")
                .with_subtype(MessageSubtype::ChannelJoin),
        ],
    );

    let reply = run(&dm(&gateway, &repo, "U1"), "<#CFEB|check-ins-2025-02>")
        .await
        .unwrap();

    assert!(reply.contains("3 check-in(s)"));
    let uploads = gateway.uploads();
    assert_eq!(uploads.len(), 1);
    let (channel, filename, content) = &uploads[0];
    assert_eq!(channel, DM_CHANNEL);
    assert_eq!(filename, "check-ins-2025-02-checkins.txt");
    let first = content.find("first").unwrap();
    let broadcast = content.find("broadcast").unwrap();
    let second = content.find("second").unwrap();
    assert!(first < broadcast && broadcast < second);
    assert!(!content.contains("not mine"));
    assert!(!content.contains("side chat"));
}

#[tokio::test]
async fn export_of_unreadable_channel_asks_to_be_added() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();
    gateway.fail("conversations.history");

    let err = run(&dm(&gateway, &repo, "U1"), "<#CSECRET>").await.unwrap_err();

    assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("add me")));
    assert!(gateway.uploads().is_empty());
}

#[tokio::test]
async fn export_by_unknown_name_is_not_found() {
    let repo = test_repo().await;
    repo.save(&configured_workspace()).await.unwrap();
    let gateway = FakeGateway::new();

    let err = run(&dm(&gateway, &repo, "U1"), "#no-such-channel").await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}
