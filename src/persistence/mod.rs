//! Persistence layer modules.
//!
//! Provides the `SQLite` connection bootstrap and repositories for
//! workspace settings, OAuth installations, and the scheduler's run log.

pub mod db;
pub mod installation_repo;
pub mod run_log_repo;
pub mod schema;
pub mod workspace_repo;

pub use sqlx::SqlitePool;
