use std::collections::BTreeSet;

use checkin_bot::grouping::classifier::{classify, find_welcome};
use checkin_bot::models::message::{ChannelMessage, MessageSubtype};

const WELCOME: &str = "1740787200.000100";

fn members(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| (*id).to_owned()).collect()
}

fn welcome() -> ChannelMessage {
    ChannelMessage::top_level("BOT", WELCOME, "Welcome to #check-ins-2025-03!")
}

#[test]
fn welcome_is_the_oldest_matching_top_level_message() {
    let history = vec![
        ChannelMessage::top_level("BOT", "1740800000.000100", "Welcome to the repost"),
        welcome(),
        ChannelMessage::reply("A", "1740700000.000100", WELCOME, "Welcome to me"),
    ];
    assert_eq!(find_welcome(&history).unwrap().ts, WELCOME);
}

#[test]
fn only_welcome_thread_replies_are_intro_only() {
    let history = vec![
        welcome(),
        ChannelMessage::top_level("P", "1740790000.000100", "status"),
        ChannelMessage::reply("I", "1740790100.000100", WELCOME, "hello"),
        ChannelMessage::reply("O", "1740790200.000100", "1740790000.000100", "nice"),
    ];
    let result = classify(&members(&["P", "I", "O", "N"]), &history);
    assert_eq!(result.intro_only, members(&["I"]));
    assert_eq!(result.no_post, members(&["N", "O"]));
}

#[test]
fn thread_broadcast_counts_as_posting() {
    let history = vec![
        welcome(),
        ChannelMessage::reply("B", "1740790100.000100", WELCOME, "hi")
            .with_subtype(MessageSubtype::ThreadBroadcast),
    ];
    let result = classify(&members(&["B"]), &history);
    assert!(result.is_empty());
}

#[test]
fn joins_and_leaves_do_not_count() {
    let history = vec![
        ChannelMessage::top_level("J", "1740780000.000100", "")
            .with_subtype(MessageSubtype::ChannelJoin),
    ];
    let result = classify(&members(&["J"]), &history);
    assert_eq!(result.no_post, members(&["J"]));
}

#[test]
fn posting_wins_over_intro() {
    let history = vec![
        welcome(),
        ChannelMessage::reply("X", "1740790100.000100", WELCOME, "hi"),
        ChannelMessage::top_level("X", "1740790200.000100", "update"),
    ];
    assert!(classify(&members(&["X"]), &history).is_empty());
}

#[test]
fn exempt_users_are_dropped() {
    let result = classify(&members(&["M", "N"]), &[]);
    let exempt: BTreeSet<String> = ["M".to_owned()].into_iter().collect();
    assert_eq!(result.without(&exempt).no_post, members(&["N"]));
}

#[test]
fn file_shares_and_me_messages_count_as_posting() {
    let history = vec![
        welcome(),
        ChannelMessage::top_level("F", "1740790100.000100", "screenshot of my week")
            .with_subtype(MessageSubtype::Other("file_share".into())),
        ChannelMessage::top_level("E", "1740790200.000100", "is heads down")
            .with_subtype(MessageSubtype::Other("me_message".into())),
    ];
    let result = classify(&members(&["F", "E"]), &history);
    assert!(result.is_empty(), "{result:?}");
}

#[test]
fn bot_integration_posts_do_not_count() {
    let history = vec![
        welcome(),
        ChannelMessage::top_level("G", "1740790100.000100", "build passed")
            .with_subtype(MessageSubtype::BotMessage),
    ];
    let result = classify(&members(&["G"]), &history);
    assert_eq!(result.no_post, members(&["G"]));
}
