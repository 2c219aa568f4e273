//! # Job Run Repository
//!
//! Persisted record of scheduled job runs, one row per `(job, period)`.
//! The unique index makes the claim in [`JobOps::claim`] succeed for
//! exactly one caller per period, across ticks and restarts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::new_id;
use crate::error::DbResult;

/// A recorded job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: String,
    pub job_name: String,
    pub period: String,
    pub ran_at: DateTime<Utc>,
}

/// Repository for reading job runs.
#[derive(Debug, Clone)]
pub struct JobRunRepository {
    pool: SqlitePool,
}

impl JobRunRepository {
    /// Creates a new JobRunRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JobRunRepository { pool }
    }

    /// Whether the job already ran for the period.
    pub async fn has_run(&self, job_name: &str, period: &str) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM job_runs WHERE job_name = ?1 AND period = ?2")
                .bind(job_name)
                .bind(period)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Most recent run of a job.
    pub async fn latest(&self, job_name: &str) -> DbResult<Option<JobRun>> {
        let run = sqlx::query_as::<_, JobRun>(
            "SELECT id, job_name, period, ran_at FROM job_runs WHERE job_name = ?1 \
             ORDER BY ran_at DESC LIMIT 1",
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }
}

/// Job claims inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct JobOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> JobOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        JobOps { conn }
    }

    /// Claims `(job_name, period)`. Returns `false` if it was already
    /// claimed.
    pub async fn claim(&mut self, job_name: &str, period: &str, at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO job_runs (id, job_name, period, ran_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(new_id())
        .bind(job_name)
        .bind(period)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        let claimed = result.rows_affected() == 1;
        if claimed {
            info!(job = %job_name, period = %period, "Job period claimed");
        }
        Ok(claimed)
    }
}
