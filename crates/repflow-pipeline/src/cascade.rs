//! Cascade deletion.
//!
//! The reverse of the persistence transaction: load the row, delete the
//! vector entry (best-effort), delete the clip file (best-effort), delete
//! the row last. The row is the source of truth; deletion is acknowledged
//! only once the row is gone. Best-effort leftovers are logged and remain
//! reachable by the reconciliation sweep.

use uuid::Uuid;

use repflow_core::models::Exercise;
use repflow_core::{AppError, Config, ExerciseStore, VectorStore};

#[derive(Debug)]
pub struct CascadeReport {
    pub exercise: Exercise,
    pub vector_deleted: bool,
    pub clip_deleted: bool,
}

#[tracing::instrument(skip(exercises, vectors, config), fields(exercise_id = %id))]
pub async fn delete_exercise(
    exercises: &dyn ExerciseStore,
    vectors: &dyn VectorStore,
    config: &Config,
    id: Uuid,
) -> Result<CascadeReport, AppError> {
    let exercise = exercises
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("exercise {}", id)))?;

    let vector_deleted = match exercise.vector_id {
        Some(vector_id) => match vectors.delete(vector_id).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, %vector_id, "Cascade: vector delete failed, sweep will retry");
                false
            }
        },
        None => true,
    };

    let clip_abs = config.resolve_clip_path(&exercise.clip_path);
    let clip_deleted = match tokio::fs::remove_file(&clip_abs).await {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::warn!(error = %err, path = %clip_abs.display(), "Cascade: clip delete failed, sweep will retry");
            false
        }
    };

    // Row last: once this succeeds the exercise no longer exists, whatever
    // happened to the side effects above.
    let deleted = exercises.delete(id).await?;
    let exercise = deleted.unwrap_or(exercise);

    tracing::info!(
        exercise_id = %id,
        vector_deleted,
        clip_deleted,
        "Exercise cascade delete complete"
    );
    Ok(CascadeReport {
        exercise,
        vector_deleted,
        clip_deleted,
    })
}
