use std::sync::Arc;

use chrono::Duration;

use checkin_bot::models::workspace::{AnnouncementRef, AnnouncementTag, WorkspaceConfig};
use checkin_bot::persistence::db;
use checkin_bot::persistence::workspace_repo::WorkspaceRepo;
use checkin_bot::AppError;

async fn repo() -> WorkspaceRepo {
    WorkspaceRepo::new(Arc::new(db::connect_memory().await.expect("db connect")))
}

#[tokio::test]
async fn ensure_exists_creates_defaults_once() {
    let repo = repo().await;

    let created = repo.ensure_exists("T1", "Acme").await.unwrap();
    assert_eq!(created.team_name, "Acme");
    assert!(created.admins.is_empty());
    assert_eq!(created.announcement_tag, AnnouncementTag::Here);
    assert!(!created.auto_add_active_users);

    repo.add_admin("T1", "U1").await.unwrap();
    let again = repo.ensure_exists("T1", "Renamed").await.unwrap();
    assert_eq!(again.team_name, "Acme");
    assert!(again.is_admin("U1"));
}

#[tokio::test]
async fn save_round_trips_every_field() {
    let repo = repo().await;
    let mut config = WorkspaceConfig::new("T1", "Acme");
    config.admins.insert("M".into());
    config.always_include_users.insert("Z".into());
    config.channel_format = Some("ci-[year]-[month]".into());
    config.announcement_channel = Some("C1".into());
    config.announcement_tag = AnnouncementTag::Channel;
    config.custom_announcement_text = "Join us".into();
    config.auto_add_active_users = true;
    config.last_announcement = Some(AnnouncementRef {
        channel: "C1".into(),
        ts: "1700000000.000100".into(),
    });

    repo.save(&config).await.unwrap();
    let loaded = repo.get("T1").await.unwrap().unwrap();

    assert_eq!(loaded.admins, config.admins);
    assert_eq!(loaded.always_include_users, config.always_include_users);
    assert_eq!(loaded.channel_format, config.channel_format);
    assert_eq!(loaded.announcement_channel, config.announcement_channel);
    assert_eq!(loaded.announcement_tag, AnnouncementTag::Channel);
    assert_eq!(loaded.custom_announcement_text, "Join us");
    assert!(loaded.auto_add_active_users);
    assert_eq!(loaded.last_announcement, config.last_announcement);
}

#[tokio::test]
async fn keep_apart_is_order_insensitive_and_rejects_self_pairs() {
    let repo = repo().await;
    repo.ensure_exists("T1", "Acme").await.unwrap();

    assert!(repo.add_incompatible_pair("T1", "UB", "UA").await.unwrap());
    assert!(!repo.add_incompatible_pair("T1", "UA", "UB").await.unwrap());
    assert!(matches!(
        repo.add_incompatible_pair("T1", "UA", "UA").await,
        Err(AppError::Validation(_))
    ));
    assert!(repo.remove_incompatible_pair("T1", "UA", "UB").await.unwrap());
    assert!(repo.get("T1").await.unwrap().unwrap().incompatible_pairs.is_empty());
}

#[tokio::test]
async fn always_include_reports_only_changes() {
    let repo = repo().await;
    repo.ensure_exists("T1", "Acme").await.unwrap();

    let added = repo
        .add_always_include_users("T1", &["U1".into(), "U2".into()])
        .await
        .unwrap();
    assert_eq!(added, vec!["U1".to_owned(), "U2".to_owned()]);
    let added = repo.add_always_include_users("T1", &["U2".into()]).await.unwrap();
    assert!(added.is_empty());

    let removed = repo
        .remove_always_include_users("T1", &["U2".into(), "U9".into()])
        .await
        .unwrap();
    assert_eq!(removed, vec!["U2".to_owned()]);
}

#[tokio::test]
async fn bad_channel_format_leaves_the_stored_one() {
    let repo = repo().await;
    repo.ensure_exists("T1", "Acme").await.unwrap();
    repo.update_channel_format("T1", "ci-[year]-[month]").await.unwrap();

    assert!(repo.update_channel_format("T1", "ci-[month]").await.is_err());
    let stored = repo.get("T1").await.unwrap().unwrap();
    assert_eq!(stored.channel_format.as_deref(), Some("ci-[year]-[month]"));
}

#[tokio::test]
async fn updates_to_unknown_workspaces_are_not_found() {
    let repo = repo().await;
    assert!(matches!(
        repo.update_auto_add_setting("T404", true).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn passcode_verifies_once() {
    let repo = repo().await;
    repo.ensure_exists("T1", "Acme").await.unwrap();
    let code = repo.generate_admin_passcode("T1", "U1").await.unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let ttl = Duration::minutes(10);
    assert!(!repo.verify_admin_passcode("T1", "U2", &code, ttl).await.unwrap());
    assert!(repo.verify_admin_passcode("T1", "U1", &code, ttl).await.unwrap());
    assert!(!repo.verify_admin_passcode("T1", "U1", &code, ttl).await.unwrap());
}

#[tokio::test]
async fn expired_passcode_is_discarded() {
    let repo = repo().await;
    repo.ensure_exists("T1", "Acme").await.unwrap();
    let code = repo.generate_admin_passcode("T1", "U1").await.unwrap();

    let expired = Duration::seconds(-1);
    assert!(!repo.verify_admin_passcode("T1", "U1", &code, expired).await.unwrap());
    let stored = repo.get("T1").await.unwrap().unwrap();
    assert!(stored.pending_admin_passcodes.is_empty());
}

#[tokio::test]
async fn new_passcode_replaces_the_pending_one() {
    let repo = repo().await;
    repo.ensure_exists("T1", "Acme").await.unwrap();
    let first = repo.generate_admin_passcode("T1", "U1").await.unwrap();
    let second = repo.generate_admin_passcode("T1", "U1").await.unwrap();

    let ttl = Duration::minutes(10);
    if first != second {
        assert!(!repo.verify_admin_passcode("T1", "U1", &first, ttl).await.unwrap());
    }
    assert!(repo.verify_admin_passcode("T1", "U1", &second, ttl).await.unwrap());
}
