//! Store seam traits.
//!
//! The orchestrator mutates three stores in concert (clips directory,
//! metadata rows, vector entries). These traits are the seams it drives;
//! `repflow-db` and `repflow-vector` provide the production implementations
//! and tests substitute in-memory fakes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Exercise, ExerciseFilter, ExercisePayload, Job, JobResult, NewExercise, NewRoutine, Routine,
};

/// Durable exercise metadata store.
#[async_trait]
pub trait ExerciseStore: Send + Sync {
    /// Insert a new row with `vector_id = NULL`. Violating the
    /// `(normalized_url, carousel_index, name)` uniqueness constraint yields
    /// [`AppError::Duplicate`].
    async fn insert(&self, exercise: &NewExercise) -> Result<Exercise, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Exercise>, AppError>;

    /// Fetch many rows preserving input order; unknown ids are skipped.
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Exercise>, AppError>;

    async fn list(&self, filter: &ExerciseFilter) -> Result<Vec<Exercise>, AppError>;

    async fn search_by_url(&self, normalized_url: &str) -> Result<Vec<Exercise>, AppError>;

    /// Fingerprint lookup used for idempotent skip before materialization.
    async fn find_by_fingerprint(
        &self,
        normalized_url: &str,
        carousel_index: i32,
        name: &str,
    ) -> Result<Option<Exercise>, AppError>;

    /// Final step of the persistence transaction.
    async fn set_vector_id(&self, id: Uuid, vector_id: Uuid) -> Result<(), AppError>;

    /// Delete a row, returning it so the caller can drive cascade cleanup.
    async fn delete(&self, id: Uuid) -> Result<Option<Exercise>, AppError>;

    /// All stored clip paths, for the reconciliation sweep.
    async fn all_clip_paths(&self) -> Result<Vec<String>, AppError>;

    /// Every row as `(id, vector_id)`, for cross-store orphan detection.
    async fn all_vector_links(&self) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError>;
}

/// A scored vector search hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub vector_id: Uuid,
    pub score: f32,
    pub payload: ExercisePayload,
}

/// Collection-level stats.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub dimension: usize,
}

/// Dense vector store keyed by opaque vector ids.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        vector_id: Uuid,
        vector: Vec<f32>,
        payload: ExercisePayload,
    ) -> Result<(), AppError>;

    /// Similarity search returning hits above `score_threshold`, best first.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, AppError>;

    async fn delete(&self, vector_id: Uuid) -> Result<(), AppError>;

    async fn info(&self) -> Result<CollectionInfo, AppError>;

    /// Every stored point as `(vector_id, database_id)`, for the
    /// reconciliation sweep. `database_id` is `None` for malformed payloads.
    async fn list_points(&self) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError>;
}

/// User-curated routine store.
#[async_trait]
pub trait RoutineStore: Send + Sync {
    async fn create(&self, routine: &NewRoutine) -> Result<Routine, AppError>;
    async fn get(&self, id: Uuid) -> Result<Option<Routine>, AppError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Routine>, AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
    /// Drop one exercise id from a routine without touching the exercise row.
    async fn remove_exercise(&self, routine_id: Uuid, exercise_id: Uuid)
        -> Result<bool, AppError>;
}

/// Background job ledger with monotonic state progression.
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Insert a `pending` row.
    async fn create(&self, job_id: &str) -> Result<(), AppError>;

    /// Transition pending → in_progress. Idempotent when already in progress.
    async fn start(&self, job_id: &str) -> Result<(), AppError>;

    /// Terminal transition. Idempotent only when called again with the same
    /// terminal state and payload; any other repeat call fails.
    async fn finish(&self, job_id: &str, result: &JobResult) -> Result<(), AppError>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>, AppError>;
}
