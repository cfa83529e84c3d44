#![forbid(unsafe_code)]

//! Slack bot that runs monthly check-in groups.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod grouping;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod slack;
pub mod state;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
