use std::io::Write;

use checkin_bot::config::GlobalConfig;
use checkin_bot::AppError;

const FULL: &str = r#"
database_path = "/var/lib/checkin-bot/bot.db"
http_port = 8080

[slack]
client_id = "123.456"
redirect_url = "https://bot.example.com/slack/oauth_redirect"

[llm]
api_base = "http://localhost:11434/v1"
model = "llama3"
emoji_count = 3
max_reactions = 2

[lifecycle]
target_group_size = 8
utc_offset_hours = 1
run_hour = 6
daily_reaction = "sun"
weekly_reaction = "date"
auto_add_lookback_days = 14

[http]
timeout_seconds = 10
max_retries = 1

[admin]
passcode_ttl_seconds = 120
"#;

#[test]
fn full_config_parses() {
    let config = GlobalConfig::from_toml_str(FULL).expect("valid config");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.slack.client_id, "123.456");
    assert_eq!(config.llm.model, "llama3");
    assert_eq!(config.lifecycle.target_group_size, 8);
    assert_eq!(config.lifecycle.daily_reaction, "sun");
    assert_eq!(config.http.timeout().as_secs(), 10);
    assert_eq!(config.passcode_ttl().num_seconds(), 120);
    assert!(config.slack.app_token.is_empty(), "tokens never come from the file");
}

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("defaults are valid");
    assert_eq!(config.http_port, 3000);
    assert_eq!(config.lifecycle.target_group_size, 11);
    assert_eq!(config.lifecycle.utc_offset_hours, -8);
    assert_eq!(config.lifecycle.daily_reaction, "sunny");
    assert_eq!(config.lifecycle.weekly_reaction, "calendar");
    assert!(!config.lifecycle.daily_reaction.is_empty());
    assert_eq!(config.passcode_ttl().num_minutes(), 10);
}

#[test]
fn invalid_values_are_rejected() {
    for bad in [
        "[lifecycle]\ntarget_group_size = 0",
        "[lifecycle]\nutc_offset_hours = 20",
        "[lifecycle]\nrun_hour = 24",
        "[lifecycle]\ndaily_reaction = \"x\"\nweekly_reaction = \"x\"",
        "[llm]\nmax_reactions = 0",
        "[http]\ntimeout_seconds = 0",
    ] {
        let err = GlobalConfig::from_toml_str(bad).unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{bad:?} gave {err}");
    }
}

#[test]
fn malformed_toml_is_a_config_error() {
    assert!(matches!(
        GlobalConfig::from_toml_str("http_port = \"eighty\""),
        Err(AppError::Config(_))
    ));
}

#[test]
fn loads_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL.as_bytes()).unwrap();
    let config = GlobalConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config.lifecycle.run_hour, 6);

    assert!(GlobalConfig::load_from_path("/definitely/missing.toml").is_err());
}
