//! Workout routine repository.
//!
//! `exercise_ids` is stored as `TEXT[]` with no foreign-key constraint;
//! stale ids survive cascade deletes and are filtered at read time by the
//! retrieval service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use repflow_core::models::{NewRoutine, Routine};
use repflow_core::{AppError, RoutineStore};

fn ids_to_text(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn row_to_routine(row: &sqlx::postgres::PgRow) -> Routine {
    let raw_ids: Vec<String> = row.get("exercise_ids");
    Routine {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        // Unparseable entries are dropped rather than failing the read.
        exercise_ids: raw_ids
            .iter()
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect(),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

#[derive(Clone)]
pub struct RoutineRepository {
    pool: PgPool,
}

impl RoutineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoutineStore for RoutineRepository {
    #[tracing::instrument(skip(self, routine), fields(db.table = "workout_routines", db.operation = "insert", routine.name = %routine.name))]
    async fn create(&self, routine: &NewRoutine) -> Result<Routine, AppError> {
        routine.validate().map_err(AppError::InputInvalid)?;

        let row = sqlx::query(
            r#"
            INSERT INTO workout_routines (id, name, description, exercise_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING id, name, description, exercise_ids, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&routine.name)
        .bind(&routine.description)
        .bind(ids_to_text(&routine.exercise_ids))
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_routine(&row))
    }

    #[tracing::instrument(skip(self), fields(db.table = "workout_routines", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Routine>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, exercise_ids, created_at, updated_at \
             FROM workout_routines WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_routine))
    }

    #[tracing::instrument(skip(self), fields(db.table = "workout_routines", db.operation = "list"))]
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Routine>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, exercise_ids, created_at, updated_at \
             FROM workout_routines ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_routine).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "workout_routines", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM workout_routines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop one exercise id from a routine's sequence without touching the
    /// exercise row itself. Returns false when the routine does not exist or
    /// does not reference the id.
    #[tracing::instrument(skip(self), fields(db.table = "workout_routines", db.operation = "update", db.record_id = %routine_id))]
    async fn remove_exercise(
        &self,
        routine_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE workout_routines
            SET exercise_ids = array_remove(exercise_ids, $2), updated_at = NOW()
            WHERE id = $1 AND $2 = ANY(exercise_ids)
            "#,
        )
        .bind(routine_id)
        .bind(exercise_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
