//! Retrieval and curation.
//!
//! Story-driven semantic search over the vector store, joined back to the
//! metadata store by the payload's `database_id`. Hits whose back-reference
//! no longer resolves are orphans and are dropped here; the reconciliation
//! sweep cleans them up out of band.

use std::sync::Arc;

use uuid::Uuid;

use repflow_core::models::{Exercise, NewRoutine, Routine};
use repflow_core::{AppError, ExerciseStore, RoutineStore, VectorStore};
use repflow_vector::diverse_select;

use crate::embedder::Embedder;

/// Default similarity floor for story search.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;
/// Default cap per movement family in a diverse result set.
pub const DEFAULT_MAX_PER_CATEGORY: usize = 2;
/// Minimum over-fetch buffer before diversification.
const SEARCH_BUFFER: usize = 40;

pub struct RetrievalService {
    exercises: Arc<dyn ExerciseStore>,
    vectors: Arc<dyn VectorStore>,
    routines: Arc<dyn RoutineStore>,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalService {
    pub fn new(
        exercises: Arc<dyn ExerciseStore>,
        vectors: Arc<dyn VectorStore>,
        routines: Arc<dyn RoutineStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            exercises,
            vectors,
            routines,
            embedder,
        }
    }

    /// Resolve a story to an ordered, diversified list of exercise ids.
    ///
    /// Over-fetches `max(2 * k_final, 40)` hits above the score threshold,
    /// applies the category cap, then joins each survivor to its metadata
    /// row. Ordering follows final score descending.
    #[tracing::instrument(skip(self))]
    pub async fn search_ids_for_story(
        &self,
        story: &str,
        k_final: usize,
    ) -> Result<Vec<Uuid>, AppError> {
        let exercises = self
            .search_exercises_for_story(story, k_final, DEFAULT_SCORE_THRESHOLD)
            .await?;
        Ok(exercises.into_iter().map(|e| e.id).collect())
    }

    /// Like [`search_ids_for_story`] but returning the joined rows, ready
    /// for UI rendering.
    pub async fn search_exercises_for_story(
        &self,
        story: &str,
        k_final: usize,
        score_threshold: f32,
    ) -> Result<Vec<Exercise>, AppError> {
        if k_final == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(story).await?;
        let fetch = (2 * k_final).max(SEARCH_BUFFER);
        let hits = self
            .vectors
            .search(query_vector, fetch, Some(score_threshold))
            .await?;
        let selected = diverse_select(hits, k_final, DEFAULT_MAX_PER_CATEGORY);

        // Join to metadata rows; unknown database_ids are orphans and drop
        // out here, preserving score order for the rest.
        let ids: Vec<Uuid> = selected.iter().map(|h| h.payload.database_id).collect();
        let rows = self.exercises.get_many(&ids).await?;
        if rows.len() < ids.len() {
            tracing::warn!(
                orphans = ids.len() - rows.len(),
                "Dropped vector hits without metadata rows"
            );
        }
        Ok(rows)
    }

    /// Fetch exercises preserving input order; unknown ids are skipped.
    pub async fn bulk_get_exercises(&self, ids: &[Uuid]) -> Result<Vec<Exercise>, AppError> {
        self.exercises.get_many(ids).await
    }

    pub async fn create_routine(&self, routine: &NewRoutine) -> Result<Routine, AppError> {
        self.routines.create(routine).await
    }

    /// Fetch a routine with stale exercise ids filtered out of the sequence.
    pub async fn get_routine(&self, id: Uuid) -> Result<Option<Routine>, AppError> {
        let Some(mut routine) = self.routines.get(id).await? else {
            return Ok(None);
        };
        let live = self.exercises.get_many(&routine.exercise_ids).await?;
        let live_ids: std::collections::HashSet<Uuid> = live.iter().map(|e| e.id).collect();
        routine.exercise_ids.retain(|id| live_ids.contains(id));
        Ok(Some(routine))
    }

    pub async fn list_routines(&self, limit: i64, offset: i64) -> Result<Vec<Routine>, AppError> {
        self.routines.list(limit, offset).await
    }

    pub async fn delete_routine(&self, id: Uuid) -> Result<bool, AppError> {
        self.routines.delete(id).await
    }

    pub async fn remove_exercise_from_routine(
        &self,
        routine_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<bool, AppError> {
        self.routines.remove_exercise(routine_id, exercise_id).await
    }
}
