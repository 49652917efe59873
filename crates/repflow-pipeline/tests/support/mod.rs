//! In-memory fakes for the store and capability seams.
//!
//! The fakes honor the same contracts as the production implementations:
//! the exercise store enforces the fingerprint uniqueness constraint, the
//! job ledger enforces monotonic transitions, and the media processor
//! writes real files so rollback behavior is observable on disk.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use repflow_core::models::{
    Exercise, ExerciseFilter, ExercisePayload, Job, JobResult, JobState, Keyframe, KeyframeMeta,
    NewExercise, NewRoutine, RawCandidate, Routine, TranscriptSegment,
};
use repflow_core::{
    AppError, CollectionInfo, Config, ExerciseStore, JobLedger, MaterializeReason, RoutineStore,
    VectorHit, VectorStore,
};
use repflow_media::MediaInfo;
use repflow_pipeline::MediaProcessor;
use repflow_services::{Analyzer, AnalyzerContext, Download, Downloader, Embedder, Transcriber};

pub fn test_config(root: &Path) -> Config {
    Config {
        database_url: "postgres://unused".into(),
        db_max_connections: 2,
        db_idle_timeout_secs: 60,
        qdrant_url: "http://unused:6334".into(),
        qdrant_api_key: None,
        qdrant_collection: "test".into(),
        ai_provider: "gemini".into(),
        gemini_api_key: Some("test".into()),
        gemini_api_backup_key: None,
        openai_api_key: Some("test".into()),
        whisper_model: "base".into(),
        max_concurrent_requests: 2,
        request_timeout_seconds: 5,
        max_download_retries: 1,
        content_root: root.join("content"),
        temp_root: root.join("temp"),
    }
}

// ---------------------------------------------------------------------------
// Stores

#[derive(Default)]
pub struct FakeExerciseStore {
    pub rows: Mutex<Vec<Exercise>>,
}

#[async_trait]
impl ExerciseStore for FakeExerciseStore {
    async fn insert(&self, exercise: &NewExercise) -> Result<Exercise, AppError> {
        exercise.validate().map_err(AppError::InputInvalid)?;
        let mut rows = self.rows.lock().unwrap();
        let duplicate = rows.iter().any(|r| {
            r.normalized_url == exercise.normalized_url
                && r.carousel_index == exercise.carousel_index
                && r.name == exercise.name
        });
        if duplicate {
            return Err(AppError::Duplicate(format!(
                "({}, {}, {})",
                exercise.normalized_url, exercise.carousel_index, exercise.name
            )));
        }
        let row = Exercise {
            id: Uuid::new_v4(),
            url: exercise.url.clone(),
            normalized_url: exercise.normalized_url.clone(),
            carousel_index: exercise.carousel_index,
            name: exercise.name.clone(),
            clip_path: exercise.clip_path.clone(),
            start_time: exercise.start_time,
            end_time: exercise.end_time,
            how_to: exercise.how_to.clone(),
            benefits: exercise.benefits.clone(),
            counteracts: exercise.counteracts.clone(),
            fitness_level: exercise.fitness_level,
            rounds_reps: exercise.rounds_reps.clone(),
            intensity: exercise.intensity,
            vector_id: None,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Exercise>, AppError> {
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Exercise>, AppError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.iter().find(|r| r.id == *id).cloned())
            .collect())
    }

    async fn list(&self, _filter: &ExerciseFilter) -> Result<Vec<Exercise>, AppError> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn search_by_url(&self, normalized_url: &str) -> Result<Vec<Exercise>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.normalized_url == normalized_url)
            .cloned()
            .collect())
    }

    async fn find_by_fingerprint(
        &self,
        normalized_url: &str,
        carousel_index: i32,
        name: &str,
    ) -> Result<Option<Exercise>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.normalized_url == normalized_url
                    && r.carousel_index == carousel_index
                    && r.name == name
            })
            .cloned())
    }

    async fn set_vector_id(&self, id: Uuid, vector_id: Uuid) -> Result<(), AppError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.vector_id = Some(vector_id);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("exercise {}", id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Exercise>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|r| r.id == id);
        Ok(pos.map(|p| rows.remove(p)))
    }

    async fn all_clip_paths(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.clip_path.clone())
            .collect())
    }

    async fn all_vector_links(&self) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.id, r.vector_id))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeVectorStore {
    pub points: Mutex<HashMap<Uuid, (Vec<f32>, ExercisePayload)>>,
    /// When set, upserts fail; used to exercise step-3 rollback.
    pub fail_upserts: Mutex<bool>,
}

impl FakeVectorStore {
    pub fn set_fail_upserts(&self, fail: bool) {
        *self.fail_upserts.lock().unwrap() = fail;
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn upsert(
        &self,
        vector_id: Uuid,
        vector: Vec<f32>,
        payload: ExercisePayload,
    ) -> Result<(), AppError> {
        if *self.fail_upserts.lock().unwrap() {
            return Err(AppError::PersistenceFailed("vector store down".into()));
        }
        self.points
            .lock()
            .unwrap()
            .insert(vector_id, (vector, payload));
        Ok(())
    }

    /// Hits score by the first vector component, so tests control ranking
    /// by seeding `vec![score, ...]`.
    async fn search(
        &self,
        _query_vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, AppError> {
        let points = self.points.lock().unwrap();
        let mut hits: Vec<VectorHit> = points
            .iter()
            .map(|(id, (vector, payload))| VectorHit {
                vector_id: *id,
                score: vector.first().copied().unwrap_or(0.0),
                payload: payload.clone(),
            })
            .filter(|h| score_threshold.map(|t| h.score >= t).unwrap_or(true))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, vector_id: Uuid) -> Result<(), AppError> {
        self.points.lock().unwrap().remove(&vector_id);
        Ok(())
    }

    async fn info(&self) -> Result<CollectionInfo, AppError> {
        Ok(CollectionInfo {
            points_count: self.points.lock().unwrap().len() as u64,
            dimension: 8,
        })
    }

    async fn list_points(&self) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError> {
        Ok(self
            .points
            .lock()
            .unwrap()
            .iter()
            .map(|(id, (_, payload))| (*id, Some(payload.database_id)))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeRoutineStore {
    pub routines: Mutex<Vec<Routine>>,
}

#[async_trait]
impl RoutineStore for FakeRoutineStore {
    async fn create(&self, routine: &NewRoutine) -> Result<Routine, AppError> {
        routine.validate().map_err(AppError::InputInvalid)?;
        let row = Routine {
            id: Uuid::new_v4(),
            name: routine.name.clone(),
            description: routine.description.clone(),
            exercise_ids: routine.exercise_ids.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.routines.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Routine>, AppError> {
        Ok(self
            .routines
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Routine>, AppError> {
        Ok(self
            .routines
            .lock()
            .unwrap()
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut routines = self.routines.lock().unwrap();
        let before = routines.len();
        routines.retain(|r| r.id != id);
        Ok(routines.len() < before)
    }

    async fn remove_exercise(
        &self,
        routine_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut routines = self.routines.lock().unwrap();
        match routines.iter_mut().find(|r| r.id == routine_id) {
            Some(routine) if routine.exercise_ids.contains(&exercise_id) => {
                routine.exercise_ids.retain(|id| *id != exercise_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct FakeJobLedger {
    pub jobs: Mutex<HashMap<String, Job>>,
    /// Every observed state per job, in order, for monotonicity assertions.
    pub transitions: Mutex<HashMap<String, Vec<JobState>>>,
}

impl FakeJobLedger {
    fn record(&self, job_id: &str, state: JobState) {
        self.transitions
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push(state);
    }
}

#[async_trait]
impl JobLedger for FakeJobLedger {
    async fn create(&self, job_id: &str) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(job_id) {
            return Err(AppError::InputInvalid(format!("job {} exists", job_id)));
        }
        jobs.insert(
            job_id.to_string(),
            Job {
                job_id: job_id.to_string(),
                state: JobState::Pending,
                result: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        drop(jobs);
        self.record(job_id, JobState::Pending);
        Ok(())
    }

    async fn start(&self, job_id: &str) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        match job.state {
            JobState::Pending | JobState::InProgress => {
                job.state = JobState::InProgress;
            }
            other => {
                return Err(AppError::Internal(format!(
                    "cannot start job from {}",
                    other
                )))
            }
        }
        drop(jobs);
        self.record(job_id, JobState::InProgress);
        Ok(())
    }

    async fn finish(&self, job_id: &str, result: &JobResult) -> Result<(), AppError> {
        let target = result.state();
        let payload = result.to_value();
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        if job.state.is_terminal() {
            if job.state == target && job.result.as_ref() == Some(&payload) {
                return Ok(());
            }
            return Err(AppError::Internal("conflicting terminal write".into()));
        }
        job.state = target;
        job.result = Some(payload);
        drop(jobs);
        self.record(job_id, target);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, AppError> {
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Capabilities

/// Produces `item_count` dummy media files per download.
pub struct FakeDownloader {
    pub item_count: usize,
    pub description: String,
    pub tags: Vec<String>,
}

impl Default for FakeDownloader {
    fn default() -> Self {
        Self {
            item_count: 1,
            description: "Quick mobility session".into(),
            tags: vec!["#mobility".into()],
        }
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, _url: &str, temp_dir: &Path) -> Result<Download, AppError> {
        tokio::fs::create_dir_all(temp_dir).await?;
        let mut files = Vec::new();
        for i in 1..=self.item_count {
            let path = temp_dir.join(format!("item_{}.mp4", i));
            tokio::fs::write(&path, b"fake media bytes").await?;
            files.push(path);
        }
        Ok(Download {
            item_count: files.len(),
            is_carousel: files.len() > 1,
            files,
            description: self.description.clone(),
            tags: self.tags.clone(),
        })
    }
}

pub struct FakeTranscriber {
    pub segments: Vec<TranscriptSegment>,
}

impl Default for FakeTranscriber {
    fn default() -> Self {
        Self {
            segments: vec![
                TranscriptSegment {
                    start: 0.0,
                    end: 5.0,
                    text: "start tall with your hands set wide".into(),
                },
                TranscriptSegment {
                    start: 5.0,
                    end: 10.0,
                    text: "lower your chest slowly down".into(),
                },
                TranscriptSegment {
                    start: 10.0,
                    end: 16.0,
                    text: "now do a push-up with control".into(),
                },
                TranscriptSegment {
                    start: 16.0,
                    end: 21.0,
                    text: "press back up to the start".into(),
                },
                TranscriptSegment {
                    start: 21.0,
                    end: 26.0,
                    text: "keep the core braced throughout".into(),
                },
                TranscriptSegment {
                    start: 26.0,
                    end: 30.0,
                    text: "repeat for the full set".into(),
                },
            ],
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _media: &Path) -> Result<Vec<TranscriptSegment>, AppError> {
        Ok(self.segments.clone())
    }
}

/// Candidate sets keyed by carousel index; missing keys yield empty lists.
/// With `fail` set, every analyze call errors (exercising the fallback).
#[derive(Default)]
pub struct FakeAnalyzer {
    pub by_index: HashMap<i32, Vec<RawCandidate>>,
    pub fail: bool,
    pub story_lines: Option<String>,
    pub calls: Mutex<VecDeque<i32>>,
}

pub fn candidate(name: &str, start: f64, end: f64, confidence: f64) -> RawCandidate {
    RawCandidate {
        name: name.to_string(),
        start_time: Some(start),
        end_time: Some(end),
        how_to: Some(format!("How to perform {}", name)),
        benefits: Some("Strength and control".into()),
        counteracts: Some("Desk posture".into()),
        fitness_level: Some(5),
        rounds_reps: Some("3 sets of 10".into()),
        intensity: Some(7),
        confidence: Some(confidence),
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        _frames: &[Keyframe],
        _transcript: Option<&[TranscriptSegment]>,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<RawCandidate>, AppError> {
        self.calls.lock().unwrap().push_back(ctx.carousel_index);
        if self.fail {
            return Err(AppError::AnalyzeFailed("model unavailable".into()));
        }
        Ok(self
            .by_index
            .get(&ctx.carousel_index)
            .cloned()
            .unwrap_or_default())
    }

    async fn generate_text(&self, _prompt: &str) -> Result<String, AppError> {
        match &self.story_lines {
            Some(text) => Ok(text.clone()),
            None => Err(AppError::AnalyzeFailed("no text model".into())),
        }
    }
}

pub struct FakeEmbedder {
    pub dimension: usize,
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self { dimension: 8 }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        // Deterministic but text-sensitive.
        let seed = text.bytes().map(|b| b as f32).sum::<f32>() % 1.0e3;
        Ok((0..self.dimension)
            .map(|i| (seed + i as f32) / 1.0e3)
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Writes real clip files so rollback deletions are observable; keyframes
/// are synthesized without touching ffmpeg.
pub struct FakeMediaProcessor {
    pub duration: f64,
    pub fail_materialize: bool,
}

impl Default for FakeMediaProcessor {
    fn default() -> Self {
        Self {
            duration: 30.0,
            fail_materialize: false,
        }
    }
}

#[async_trait]
impl MediaProcessor for FakeMediaProcessor {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo, AppError> {
        Ok(MediaInfo {
            duration: self.duration,
            width: 1080,
            height: 1920,
            fps: 30.0,
            has_audio: true,
        })
    }

    async fn extract_keyframes(
        &self,
        _video: &Path,
        info: &MediaInfo,
        _work_dir: &Path,
        frames_dir: &Path,
    ) -> Result<Vec<Keyframe>, AppError> {
        tokio::fs::create_dir_all(frames_dir).await?;
        let mut frames = Vec::new();
        let count = info.duration.ceil() as u64;
        for second in 0..count {
            let meta = KeyframeMeta {
                cut_index: 1,
                frame_number: second * 30,
                timestamp_ms: second * 1000,
                diff_score: 5,
            };
            let path = frames_dir.join(meta.file_name());
            tokio::fs::write(&path, b"jpeg").await?;
            frames.push(Keyframe { path, meta });
        }
        Ok(frames)
    }

    async fn materialize_clip(
        &self,
        source: &Path,
        start: f64,
        _end: f64,
        clips_dir: &Path,
        name: &str,
    ) -> Result<String, AppError> {
        if self.fail_materialize {
            return Err(AppError::MaterializeFailed {
                reason: MaterializeReason::ToolExitNonzero,
                message: "ffmpeg exited with 1".into(),
            });
        }
        tokio::fs::create_dir_all(clips_dir).await?;
        let file_name = repflow_media::ClipMaterializer::clip_file_name(name, source, start);
        tokio::fs::write(clips_dir.join(&file_name), b"clip bytes").await?;
        Ok(file_name)
    }
}

/// Clip files currently present under the content root.
pub fn clip_files(config: &Config) -> Vec<PathBuf> {
    let dir = config.clips_dir();
    match std::fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "mp4"))
            .collect(),
        Err(_) => Vec::new(),
    }
}
