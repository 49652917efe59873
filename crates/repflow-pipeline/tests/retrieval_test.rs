//! Story retrieval, routine curation, cascade deletion, and the
//! reconciliation sweep, over in-memory stores.

mod support;

use std::sync::Arc;

use uuid::Uuid;

use repflow_core::models::{ExercisePayload, NewExercise, NewRoutine};
use repflow_core::{ExerciseStore, VectorStore};
use repflow_pipeline::{delete_exercise, sweep};
use repflow_services::RetrievalService;

use support::{test_config, FakeEmbedder, FakeExerciseStore, FakeRoutineStore, FakeVectorStore};

fn new_exercise(name: &str, index: i32) -> NewExercise {
    NewExercise {
        url: "https://www.youtube.com/watch?v=abc".into(),
        normalized_url: "https://www.youtube.com/watch".into(),
        carousel_index: index,
        name: name.into(),
        clip_path: format!("clips/{}_{}.mp4", name.to_lowercase().replace(' ', "_"), index),
        start_time: 0.0,
        end_time: 12.0,
        how_to: Some(format!("How to perform {}", name)),
        benefits: None,
        counteracts: None,
        fitness_level: Some(5),
        rounds_reps: None,
        intensity: Some(5),
    }
}

struct RetrievalHarness {
    exercises: Arc<FakeExerciseStore>,
    vectors: Arc<FakeVectorStore>,
    _routines: Arc<FakeRoutineStore>,
    service: RetrievalService,
}

impl RetrievalHarness {
    fn build() -> Self {
        let exercises = Arc::new(FakeExerciseStore::default());
        let vectors = Arc::new(FakeVectorStore::default());
        let routines = Arc::new(FakeRoutineStore::default());
        let service = RetrievalService::new(
            exercises.clone(),
            vectors.clone(),
            routines.clone(),
            Arc::new(FakeEmbedder::default()),
        );
        Self {
            exercises,
            vectors,
            _routines: routines,
            service,
        }
    }

    /// Insert a stored exercise plus its vector entry at a chosen score.
    async fn seed(&self, name: &str, index: i32, score: f32) -> Uuid {
        let exercise = self.exercises.insert(&new_exercise(name, index)).await.unwrap();
        let vector_id = Uuid::new_v4();
        let payload = ExercisePayload::from_exercise(&exercise);
        self.vectors
            .upsert(vector_id, vec![score, 0.0, 0.0], payload)
            .await
            .unwrap();
        self.exercises
            .set_vector_id(exercise.id, vector_id)
            .await
            .unwrap();
        exercise.id
    }
}

#[tokio::test]
async fn diverse_search_caps_categories_and_orders_by_score() {
    let harness = RetrievalHarness::build();

    // Forty candidates above threshold across five movement families, best
    // scores concentrated in one family to force the cap to bite.
    let families = ["Handstand Drill", "Hamstring Stretch", "Plank Hold", "Push-Up", "Split Squat"];
    let mut index = 1;
    for (f, family) in families.iter().enumerate() {
        for i in 0..8 {
            let score = 0.95 - (f * 8 + i) as f32 * 0.01;
            harness
                .seed(&format!("{} {}", family, i + 1), index, score)
                .await;
            index += 1;
        }
    }

    let ids = harness
        .service
        .search_ids_for_story("shoulder mobility for desk workers", 5)
        .await
        .unwrap();
    assert_eq!(ids.len(), 5);

    let rows = harness.service.bulk_get_exercises(&ids).await.unwrap();
    assert_eq!(rows.len(), 5);

    // No more than two per family.
    let mut per_family = std::collections::HashMap::new();
    for row in &rows {
        let family = families
            .iter()
            .find(|f| row.name.starts_with(**f))
            .copied()
            .unwrap_or("other");
        *per_family.entry(family).or_insert(0usize) += 1;
    }
    assert!(per_family.values().all(|&c| c <= 2), "{:?}", per_family);
}

#[tokio::test]
async fn orphan_vector_hits_are_dropped_from_results() {
    let harness = RetrievalHarness::build();
    harness.seed("Deep Squat", 1, 0.9).await;

    // A high-scoring vector entry whose back-reference resolves nowhere.
    let orphan_payload = ExercisePayload {
        database_id: Uuid::new_v4(),
        name: "Ghost Stretch".into(),
        how_to: None,
        benefits: None,
        counteracts: None,
        fitness_level: None,
        intensity: None,
    };
    harness
        .vectors
        .upsert(Uuid::new_v4(), vec![0.99, 0.0, 0.0], orphan_payload)
        .await
        .unwrap();

    let ids = harness
        .service
        .search_ids_for_story("leg strength", 5)
        .await
        .unwrap();
    let rows = harness.service.bulk_get_exercises(&ids).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Deep Squat");
}

#[tokio::test]
async fn bulk_get_preserves_order_and_skips_unknown_ids() {
    let harness = RetrievalHarness::build();
    let a = harness.seed("Bridge", 1, 0.5).await;
    let b = harness.seed("Lunge", 2, 0.5).await;
    let unknown = Uuid::new_v4();

    let rows = harness
        .service
        .bulk_get_exercises(&[b, unknown, a, b])
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Lunge", "Bridge", "Lunge"]);
}

#[tokio::test]
async fn routines_filter_stale_ids_at_read_time() {
    let harness = RetrievalHarness::build();
    let keep = harness.seed("Bridge", 1, 0.5).await;
    let gone = harness.seed("Lunge", 2, 0.5).await;

    let routine = harness
        .service
        .create_routine(&NewRoutine {
            name: "Posterior chain".into(),
            description: None,
            exercise_ids: vec![keep, gone, keep],
        })
        .await
        .unwrap();

    // Cascade-delete one referenced exercise; the routine keeps the id on
    // disk but read-time filtering hides it.
    harness.exercises.delete(gone).await.unwrap();
    let fetched = harness.service.get_routine(routine.id).await.unwrap().unwrap();
    assert_eq!(fetched.exercise_ids, vec![keep, keep]);
}

#[tokio::test]
async fn cascade_delete_removes_row_vector_and_clip() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let harness = RetrievalHarness::build();
    let id = harness.seed("Deep Squat", 1, 0.9).await;

    // Materialize the clip file the row points at.
    let row = harness.exercises.get(id).await.unwrap().unwrap();
    let clip_abs = config.resolve_clip_path(&row.clip_path);
    std::fs::create_dir_all(clip_abs.parent().unwrap()).unwrap();
    std::fs::write(&clip_abs, b"clip").unwrap();
    let vector_id = row.vector_id.unwrap();

    let report = delete_exercise(
        harness.exercises.as_ref(),
        harness.vectors.as_ref(),
        &config,
        id,
    )
    .await
    .unwrap();
    assert!(report.vector_deleted);
    assert!(report.clip_deleted);

    // Former id and former vector id both resolve to nothing.
    assert!(harness.exercises.get(id).await.unwrap().is_none());
    assert!(!harness
        .vectors
        .points
        .lock()
        .unwrap()
        .contains_key(&vector_id));
    assert!(!clip_abs.exists());
}

#[tokio::test]
async fn cascade_delete_unknown_id_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let harness = RetrievalHarness::build();
    let err = delete_exercise(
        harness.exercises.as_ref(),
        harness.vectors.as_ref(),
        &config,
        Uuid::new_v4(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "input_invalid");
}

#[tokio::test]
async fn sweep_finds_and_removes_cross_store_orphans() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let harness = RetrievalHarness::build();

    // A healthy exercise with clip and vector.
    let id = harness.seed("Bridge", 1, 0.5).await;
    let row = harness.exercises.get(id).await.unwrap().unwrap();
    let clip_abs = config.resolve_clip_path(&row.clip_path);
    std::fs::create_dir_all(clip_abs.parent().unwrap()).unwrap();
    std::fs::write(&clip_abs, b"clip").unwrap();

    // An orphan clip nothing references.
    let orphan_clip = config.clips_dir().join("leftover_deadbeef.mp4");
    std::fs::write(&orphan_clip, b"clip").unwrap();

    // An orphan vector entry with an unresolvable back-reference.
    let orphan_vector = Uuid::new_v4();
    harness
        .vectors
        .upsert(
            orphan_vector,
            vec![0.4, 0.0, 0.0],
            ExercisePayload {
                database_id: Uuid::new_v4(),
                name: "Ghost".into(),
                how_to: None,
                benefits: None,
                counteracts: None,
                fitness_level: None,
                intensity: None,
            },
        )
        .await
        .unwrap();

    // Dry run reports but removes nothing.
    let report = sweep(
        harness.exercises.as_ref(),
        harness.vectors.as_ref(),
        &config,
        true,
    )
    .await
    .unwrap();
    assert_eq!(report.orphan_clips, vec!["leftover_deadbeef.mp4".to_string()]);
    assert_eq!(report.orphan_vectors, vec![orphan_vector]);
    assert!(orphan_clip.exists());

    // Real run removes the orphans and keeps the healthy pair.
    let report = sweep(
        harness.exercises.as_ref(),
        harness.vectors.as_ref(),
        &config,
        false,
    )
    .await
    .unwrap();
    assert_eq!(report.orphan_clips.len(), 1);
    assert!(!orphan_clip.exists());
    assert!(clip_abs.exists());
    assert!(!harness
        .vectors
        .points
        .lock()
        .unwrap()
        .contains_key(&orphan_vector));
    assert!(report.rows_missing_vectors.is_empty());

}
