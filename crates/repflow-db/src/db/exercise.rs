//! Exercise repository.
//!
//! All reads cast the `NUMERIC(10,3)` temporal columns to `float8` so the
//! domain model stays in `f64`; writes cast back to `NUMERIC(10,3)` so the
//! stored precision is what the schema declares.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use repflow_core::models::{Exercise, ExerciseFilter, NewExercise};
use repflow_core::{AppError, ExerciseStore};

/// Column list shared by every SELECT so `Exercise::from_row` always sees the
/// same shape.
const EXERCISE_COLUMNS: &str = "id, url, normalized_url, carousel_index, name, clip_path, \
     start_time::float8 AS start_time, end_time::float8 AS end_time, \
     how_to, benefits, counteracts, fitness_level, rounds_reps, intensity, \
     vector_id, created_at";

/// Escape `%`, `_`, and `\` so user-provided substrings cannot act as
/// wildcards in a LIKE pattern.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone)]
pub struct ExerciseRepository {
    pool: PgPool,
}

impl ExerciseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExerciseStore for ExerciseRepository {
    #[tracing::instrument(skip(self, exercise), fields(db.table = "exercises", db.operation = "insert", exercise.name = %exercise.name))]
    async fn insert(&self, exercise: &NewExercise) -> Result<Exercise, AppError> {
        exercise.validate().map_err(AppError::InputInvalid)?;

        let id = Uuid::new_v4();
        let result = sqlx::query_as::<sqlx::Postgres, Exercise>(&format!(
            r#"
            INSERT INTO exercises (
                id, url, normalized_url, carousel_index, name, clip_path,
                start_time, end_time, how_to, benefits, counteracts,
                fitness_level, rounds_reps, intensity, vector_id
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                CAST($7 AS NUMERIC(10,3)), CAST($8 AS NUMERIC(10,3)),
                $9, $10, $11, $12, $13, $14, NULL
            )
            RETURNING {EXERCISE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&exercise.url)
        .bind(&exercise.normalized_url)
        .bind(exercise.carousel_index)
        .bind(&exercise.name)
        .bind(&exercise.clip_path)
        .bind(exercise.start_time)
        .bind(exercise.end_time)
        .bind(&exercise.how_to)
        .bind(&exercise.benefits)
        .bind(&exercise.counteracts)
        .bind(exercise.fitness_level)
        .bind(&exercise.rounds_reps)
        .bind(exercise.intensity)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::Duplicate(format!(
                    "({}, {}, {})",
                    exercise.normalized_url, exercise.carousel_index, exercise.name
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Exercise>, AppError> {
        let row = sqlx::query_as::<sqlx::Postgres, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "exercises", db.operation = "select_many", count = ids.len()))]
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Exercise>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<sqlx::Postgres, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        // Restore caller order; unknown ids are skipped. Duplicated ids in
        // the input produce duplicated rows, matching routine playback.
        let by_id: std::collections::HashMap<Uuid, Exercise> =
            rows.into_iter().map(|e| (e.id, e)).collect();
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    #[tracing::instrument(skip(self, filter), fields(db.table = "exercises", db.operation = "list"))]
    async fn list(&self, filter: &ExerciseFilter) -> Result<Vec<Exercise>, AppError> {
        let mut sql = format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE 1=1");
        let mut arg_idx = 0usize;
        let mut next = || {
            arg_idx += 1;
            arg_idx
        };

        let name_pattern = filter
            .name_contains
            .as_ref()
            .map(|name| format!("%{}%", escape_like(name)));
        if name_pattern.is_some() {
            sql.push_str(&format!(" AND name ILIKE ${} ESCAPE '\\'", next()));
        }
        if filter.fitness_level_min.is_some() {
            sql.push_str(&format!(" AND fitness_level >= ${}", next()));
        }
        if filter.fitness_level_max.is_some() {
            sql.push_str(&format!(" AND fitness_level <= ${}", next()));
        }
        if filter.intensity_min.is_some() {
            sql.push_str(&format!(" AND intensity >= ${}", next()));
        }
        if filter.intensity_max.is_some() {
            sql.push_str(&format!(" AND intensity <= ${}", next()));
        }
        if filter.created_after.is_some() {
            sql.push_str(&format!(" AND created_at >= ${}", next()));
        }
        if filter.created_before.is_some() {
            sql.push_str(&format!(" AND created_at <= ${}", next()));
        }
        sql.push_str(" ORDER BY created_at DESC");
        sql.push_str(&format!(" LIMIT ${}", next()));

        let mut query = sqlx::query_as::<sqlx::Postgres, Exercise>(&sql);
        if let Some(pattern) = &name_pattern {
            query = query.bind(pattern);
        }
        if let Some(v) = filter.fitness_level_min {
            query = query.bind(v);
        }
        if let Some(v) = filter.fitness_level_max {
            query = query.bind(v);
        }
        if let Some(v) = filter.intensity_min {
            query = query.bind(v);
        }
        if let Some(v) = filter.intensity_max {
            query = query.bind(v);
        }
        if let Some(v) = filter.created_after {
            query = query.bind(v);
        }
        if let Some(v) = filter.created_before {
            query = query.bind(v);
        }
        query = query.bind(filter.limit.unwrap_or(50));

        Ok(query.fetch_all(&self.pool).await?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "select_by_url"))]
    async fn search_by_url(&self, normalized_url: &str) -> Result<Vec<Exercise>, AppError> {
        let rows = sqlx::query_as::<sqlx::Postgres, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises \
             WHERE normalized_url = $1 ORDER BY carousel_index, created_at"
        ))
        .bind(normalized_url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "select_fingerprint"))]
    async fn find_by_fingerprint(
        &self,
        normalized_url: &str,
        carousel_index: i32,
        name: &str,
    ) -> Result<Option<Exercise>, AppError> {
        let row = sqlx::query_as::<sqlx::Postgres, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises \
             WHERE normalized_url = $1 AND carousel_index = $2 AND name = $3"
        ))
        .bind(normalized_url)
        .bind(carousel_index)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "update", db.record_id = %id))]
    async fn set_vector_id(&self, id: Uuid, vector_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE exercises SET vector_id = $2 WHERE id = $1")
            .bind(id)
            .bind(vector_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("exercise {}", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<Option<Exercise>, AppError> {
        let row = sqlx::query_as::<sqlx::Postgres, Exercise>(&format!(
            "DELETE FROM exercises WHERE id = $1 RETURNING {EXERCISE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "select_clip_paths"))]
    async fn all_clip_paths(&self) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT clip_path FROM exercises")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "exercises", db.operation = "select_vector_links"))]
    async fn all_vector_links(&self) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError> {
        let rows: Vec<(Uuid, Option<Uuid>)> =
            sqlx::query_as("SELECT id, vector_id FROM exercises")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
