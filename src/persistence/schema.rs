//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so the bootstrap
//! re-runs on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS workspace (
    team_id                  TEXT PRIMARY KEY NOT NULL,
    team_name                TEXT NOT NULL,
    admins                   TEXT NOT NULL DEFAULT '[]',
    incompatible_pairs       TEXT NOT NULL DEFAULT '[]',
    always_include_users     TEXT NOT NULL DEFAULT '[]',
    channel_format           TEXT,
    announcement_channel     TEXT,
    announcement_tag         TEXT NOT NULL DEFAULT 'here' CHECK(announcement_tag IN ('here','channel')),
    custom_announcement_text TEXT NOT NULL DEFAULT '',
    auto_add_active_users    INTEGER NOT NULL DEFAULT 0,
    last_announcement        TEXT,
    pending_admin_passcodes  TEXT NOT NULL DEFAULT '{}',
    installed_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS installation (
    team_id       TEXT PRIMARY KEY NOT NULL,
    team_name     TEXT NOT NULL,
    bot_token     TEXT NOT NULL,
    bot_user_id   TEXT,
    installed_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lifecycle_run (
    run_date      TEXT PRIMARY KEY NOT NULL,
    completed_at  TEXT NOT NULL
);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
