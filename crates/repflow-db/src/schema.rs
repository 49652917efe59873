//! Schema initialization.
//!
//! Idempotent DDL for the three tables. Run once at startup (`repflow init`);
//! safe to re-run against an existing database.

use sqlx::PgPool;

use repflow_core::AppError;

pub async fn init_schema(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exercises (
            id UUID PRIMARY KEY,
            url TEXT NOT NULL,
            normalized_url TEXT NOT NULL,
            carousel_index INTEGER NOT NULL DEFAULT 1,
            name VARCHAR(200) NOT NULL,
            clip_path TEXT NOT NULL,
            start_time NUMERIC(10,3) NOT NULL,
            end_time NUMERIC(10,3) NOT NULL,
            how_to TEXT,
            benefits TEXT,
            counteracts TEXT,
            fitness_level INTEGER CHECK (fitness_level >= 0 AND fitness_level <= 10),
            rounds_reps TEXT,
            intensity INTEGER CHECK (intensity >= 0 AND intensity <= 10),
            vector_id UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT exercises_fingerprint_key UNIQUE (normalized_url, carousel_index, name),
            CONSTRAINT exercises_min_duration CHECK (end_time - start_time >= 3.5)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_exercises_url ON exercises(url)",
        "CREATE INDEX IF NOT EXISTS idx_exercises_fitness_level ON exercises(fitness_level)",
        "CREATE INDEX IF NOT EXISTS idx_exercises_intensity ON exercises(intensity)",
        "CREATE INDEX IF NOT EXISTS idx_exercises_created_at ON exercises(created_at)",
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workout_routines (
            id UUID PRIMARY KEY,
            name VARCHAR(200) NOT NULL,
            description TEXT,
            exercise_ids TEXT[] NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            job_id TEXT PRIMARY KEY,
            state TEXT NOT NULL CHECK (state IN ('pending', 'in_progress', 'done', 'failed')),
            result JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema initialized");
    Ok(())
}
