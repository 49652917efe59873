//! Job ledger repository.
//!
//! State progression is guarded in SQL: pending → in_progress → (done |
//! failed), never backwards. `finish` is idempotent only when re-invoked
//! with an identical terminal state and payload.

use async_trait::async_trait;
use sqlx::PgPool;

use repflow_core::models::{Job, JobResult, JobState};
use repflow_core::{AppError, JobLedger};

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLedger for JobRepository {
    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "insert"))]
    async fn create(&self, job_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO jobs (job_id, state, created_at, updated_at) \
             VALUES ($1, 'pending', NOW(), NOW()) \
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::InputInvalid(format!(
                "job {} already exists",
                job_id
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "update"))]
    async fn start(&self, job_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'in_progress', updated_at = NOW() \
             WHERE job_id = $1 AND state IN ('pending', 'in_progress')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            let current = self.get(job_id).await?;
            return Err(match current {
                None => AppError::NotFound(format!("job {}", job_id)),
                Some(job) => AppError::Internal(format!(
                    "job {} cannot start from state {}",
                    job_id, job.state
                )),
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, result), fields(db.table = "jobs", db.operation = "update"))]
    async fn finish(&self, job_id: &str, result: &JobResult) -> Result<(), AppError> {
        let target_state = result.state();
        let payload = result.to_value();

        let updated = sqlx::query(
            "UPDATE jobs SET state = $2, result = $3, updated_at = NOW() \
             WHERE job_id = $1 AND state IN ('pending', 'in_progress')",
        )
        .bind(job_id)
        .bind(target_state.to_string())
        .bind(&payload)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() > 0 {
            return Ok(());
        }

        // Already terminal: accept only the identical terminal write.
        let current = self
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        if current.state == target_state && current.result.as_ref() == Some(&payload) {
            return Ok(());
        }
        Err(AppError::Internal(format!(
            "job {} already finished as {}; refusing conflicting terminal write",
            job_id, current.state
        )))
    }

    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "select"))]
    async fn get(&self, job_id: &str) -> Result<Option<Job>, AppError> {
        let job = sqlx::query_as::<sqlx::Postgres, Job>(
            "SELECT job_id, state, result, created_at, updated_at FROM jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }
}
