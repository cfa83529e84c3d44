//! Record of reference dates the scheduler has already processed.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{AppError, Result};

use super::db::Database;

/// Repository for completed scheduled runs.
#[derive(Clone)]
pub struct RunLogRepo {
    db: Arc<Database>,
}

impl RunLogRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Most recent reference date recorded as complete.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a stored date is malformed.
    pub async fn last_run_date(&self) -> Result<Option<NaiveDate>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT run_date FROM lifecycle_run ORDER BY run_date DESC LIMIT 1")
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(|(raw,)| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| AppError::Db(format!("invalid run_date: {e}")))
        })
        .transpose()
    }

    /// Mark `date` as processed. Recording the same date twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn record(&self, date: NaiveDate) -> Result<()> {
        sqlx::query(
            "INSERT INTO lifecycle_run (run_date, completed_at) VALUES (?1, ?2)
             ON CONFLICT(run_date) DO NOTHING",
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }
}
