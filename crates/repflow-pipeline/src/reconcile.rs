//! Reconciliation sweep.
//!
//! Clip files are owned by their exercise row and vector entries carry a
//! mandatory `database_id` back-reference. The sweep enforces both
//! ownership rules after crashes or best-effort cascade failures:
//!
//! - clip files under the content root that no row references are deleted,
//! - vector points whose `database_id` does not resolve (or is missing)
//!   are deleted,
//! - rows whose `vector_id` no longer exists in the vector store are
//!   reported for re-embedding; the sweep never deletes rows.

use std::collections::HashSet;

use uuid::Uuid;

use repflow_core::{AppError, Config, ExerciseStore, VectorStore};

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Clip file names removed (or that would be removed in dry-run).
    pub orphan_clips: Vec<String>,
    /// Vector ids removed (or that would be removed in dry-run).
    pub orphan_vectors: Vec<Uuid>,
    /// Rows whose vector entry is missing; these need re-embedding.
    pub rows_missing_vectors: Vec<Uuid>,
    pub dry_run: bool,
}

#[tracing::instrument(skip(exercises, vectors, config))]
pub async fn sweep(
    exercises: &dyn ExerciseStore,
    vectors: &dyn VectorStore,
    config: &Config,
    dry_run: bool,
) -> Result<ReconcileReport, AppError> {
    let mut report = ReconcileReport {
        dry_run,
        ..Default::default()
    };

    // Orphan clips: files on disk no row points at.
    let referenced: HashSet<String> = exercises
        .all_clip_paths()
        .await?
        .into_iter()
        .filter_map(|p| {
            p.rsplit('/')
                .next()
                .map(|name| name.to_string())
        })
        .collect();

    let clips_dir = config.clips_dir();
    if let Ok(mut entries) = tokio::fs::read_dir(&clips_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "mp4") {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !referenced.contains(file_name) {
                report.orphan_clips.push(file_name.to_string());
                if !dry_run {
                    if let Err(err) = tokio::fs::remove_file(&path).await {
                        tracing::warn!(error = %err, file = file_name, "Sweep: clip delete failed");
                    }
                }
            }
        }
    }

    // Cross-store orphans, both directions.
    let links = exercises.all_vector_links().await?;
    let row_ids: HashSet<Uuid> = links.iter().map(|(id, _)| *id).collect();
    let points = vectors.list_points().await?;
    let point_ids: HashSet<Uuid> = points.iter().map(|(vid, _)| *vid).collect();

    for (vector_id, database_id) in &points {
        let resolves = database_id.map(|id| row_ids.contains(&id)).unwrap_or(false);
        if !resolves {
            report.orphan_vectors.push(*vector_id);
            if !dry_run {
                if let Err(err) = vectors.delete(*vector_id).await {
                    tracing::warn!(error = %err, %vector_id, "Sweep: vector delete failed");
                }
            }
        }
    }

    for (row_id, vector_id) in &links {
        let intact = vector_id.map(|vid| point_ids.contains(&vid)).unwrap_or(false);
        if !intact {
            report.rows_missing_vectors.push(*row_id);
        }
    }

    tracing::info!(
        orphan_clips = report.orphan_clips.len(),
        orphan_vectors = report.orphan_vectors.len(),
        rows_missing_vectors = report.rows_missing_vectors.len(),
        dry_run,
        "Reconciliation sweep complete"
    );
    Ok(report)
}
