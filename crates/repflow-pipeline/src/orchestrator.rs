//! Pipeline orchestrator.
//!
//! Drives one ingestion end to end:
//!
//! ```text
//! received -> normalized -> classified -> downloaded -> {per media file}
//!   -> transcribed -> frames_extracted -> analyzed -> normalized_segments
//!   -> materialized -> persisted
//! ```
//!
//! Carousel items run sequentially in deterministic order; one item's
//! failure never aborts its siblings, and the job fails only when every
//! item failed. The per-exercise persistence transaction and its rollback
//! order are the critical invariants here: a failure at any step must leave
//! no clip file, no row, and no vector entry behind for that attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use repflow_core::models::{
    meets_quality_gate, Candidate, CreatedClip, ErrorEnvelope, ItemReport, ItemStatus, JobResult,
    NewExercise, TranscriptSegment,
};
use repflow_core::models::payload::ExercisePayload;
use repflow_core::{classify, normalize, platform, AppError, Config, UrlKind};
use repflow_core::{ExerciseStore, JobLedger, VectorStore};
use repflow_services::{keyword_fallback, Analyzer, AnalyzerContext, Downloader, Embedder, Transcriber};

use crate::cancel::CancelToken;
use crate::media_ops::MediaProcessor;
use crate::normalize::normalize_candidates;
use crate::retry::{retry_with_timeout, DEFAULT_ATTEMPTS};

/// Transcript duration must agree with the video duration within this
/// fraction before the transcript is trusted as speech (vs. looped music).
const TRANSCRIPT_DURATION_TOLERANCE: f64 = 0.1;

/// Configured collaborators for the pipeline. Constructed once at startup
/// and shared by reference across concurrent pipelines.
pub struct PipelineContext {
    pub config: Config,
    pub downloader: Arc<dyn Downloader>,
    pub transcriber: Arc<dyn Transcriber>,
    pub analyzer: Arc<dyn Analyzer>,
    pub embedder: Arc<dyn Embedder>,
    pub media: Arc<dyn MediaProcessor>,
    pub exercises: Arc<dyn ExerciseStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub jobs: Arc<dyn JobLedger>,
}

pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
}

enum PersistOutcome {
    Created(CreatedClip),
    DuplicateSkipped,
}

struct ItemOutcome {
    report: ItemReport,
    created: Vec<CreatedClip>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.ctx.config.request_timeout_seconds)
    }

    /// Run one ingestion to a terminal job state. Always records the result
    /// on the ledger before returning it.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run(&self, url: &str, job_id: &str, cancel: &CancelToken) -> JobResult {
        let started = Instant::now();
        let result = match self.run_inner(url, job_id, cancel, started).await {
            Ok(result) => result,
            Err(err) => {
                let (kind, message) = err.to_envelope();
                tracing::error!(error = %err, kind, "Pipeline failed");
                JobResult::Failed {
                    error: ErrorEnvelope { kind, message },
                    items: vec![],
                }
            }
        };
        if let Err(err) = self.ctx.jobs.finish(job_id, &result).await {
            tracing::error!(error = %err, job_id, "Failed to record terminal job state");
        }
        result
    }

    async fn run_inner(
        &self,
        url: &str,
        job_id: &str,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<JobResult, AppError> {
        self.ctx.jobs.start(job_id).await?;
        cancel.check()?;

        let normalized_url = normalize(url)?;
        if classify(url) == UrlKind::Unsupported {
            return Err(AppError::InputInvalid(format!(
                "unsupported platform: {}",
                url
            )));
        }
        tracing::info!(%normalized_url, "URL classified");

        let temp_dir = self.ctx.config.temp_dir_for(job_id);
        tokio::fs::create_dir_all(&temp_dir).await?;

        let outcome = self
            .process(url, &normalized_url, cancel, &temp_dir, started)
            .await;

        // The pipeline owns its temp tree exclusively and deletes it on
        // exit, success or failure.
        if let Err(err) = tokio::fs::remove_dir_all(&temp_dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %err, dir = %temp_dir.display(), "Temp cleanup failed");
            }
        }
        outcome
    }

    async fn process(
        &self,
        url: &str,
        normalized_url: &str,
        cancel: &CancelToken,
        temp_dir: &Path,
        started: Instant,
    ) -> Result<JobResult, AppError> {
        let download_dir = temp_dir.join("download");
        let downloader = self.ctx.downloader.clone();
        let download = retry_with_timeout(
            "download",
            self.ctx.config.max_download_retries.max(1),
            self.call_timeout(),
            cancel,
            || {
                let downloader = downloader.clone();
                let download_dir = download_dir.clone();
                async move { downloader.download(url, &download_dir).await }
            },
        )
        .await?;

        tracing::info!(
            files = download.files.len(),
            is_carousel = download.is_carousel,
            "Download complete"
        );

        let explicit_index = repflow_core::carousel_index(url);
        let total_items = download.files.len();
        let mut items: Vec<ItemReport> = Vec::with_capacity(total_items);
        let mut processed_clips: Vec<CreatedClip> = Vec::new();
        let mut first_error: Option<ErrorEnvelope> = None;

        for (i, media_file) in download.files.iter().enumerate() {
            cancel.check()?;
            let item_index = if total_items == 1 {
                explicit_index.map(|idx| idx as i32).unwrap_or(1)
            } else {
                (i + 1) as i32
            };

            let item_temp = temp_dir.join(format!("item_{}", item_index));
            tokio::fs::create_dir_all(&item_temp).await?;

            match self
                .process_item(ProcessItem {
                    url,
                    normalized_url,
                    media_file,
                    item_index,
                    total_items,
                    description: &download.description,
                    tags: &download.tags,
                    item_temp: &item_temp,
                    cancel,
                })
                .await
            {
                Ok(outcome) => {
                    processed_clips.extend(outcome.created);
                    items.push(outcome.report);
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(err) => {
                    let (kind, message) = err.to_envelope();
                    tracing::warn!(item_index, error = %err, "Carousel item failed");
                    let envelope = ErrorEnvelope { kind, message };
                    if first_error.is_none() {
                        first_error = Some(envelope.clone());
                    }
                    items.push(ItemReport {
                        carousel_index: item_index,
                        status: ItemStatus::Failed,
                        created: 0,
                        error: Some(envelope),
                    });
                }
            }
        }

        let all_failed =
            !items.is_empty() && items.iter().all(|i| i.status == ItemStatus::Failed);
        if all_failed {
            return Ok(JobResult::Failed {
                error: first_error.unwrap_or(ErrorEnvelope {
                    kind: "internal".into(),
                    message: "all items failed".into(),
                }),
                items,
            });
        }

        Ok(JobResult::Done {
            total_clips: processed_clips.len(),
            processed_clips,
            items,
            processing_time_secs: started.elapsed().as_secs_f64(),
        })
    }

    async fn process_item(&self, item: ProcessItem<'_>) -> Result<ItemOutcome, AppError> {
        let ProcessItem {
            url,
            normalized_url,
            media_file,
            item_index,
            total_items,
            description,
            tags,
            item_temp,
            cancel,
        } = item;

        let info = self.ctx.media.probe(media_file).await?;
        cancel.check()?;

        // Transcription degrades gracefully; a failed transcriber means an
        // empty transcript, never a failed item.
        let transcriber = self.ctx.transcriber.clone();
        let media_file_owned = media_file.to_path_buf();
        let transcript = match retry_with_timeout(
            "transcribe",
            DEFAULT_ATTEMPTS,
            self.call_timeout(),
            cancel,
            || {
                let transcriber = transcriber.clone();
                let media_file = media_file_owned.clone();
                async move { transcriber.transcribe(&media_file).await }
            },
        )
        .await
        {
            Ok(segments) => segments,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(err) => {
                tracing::warn!(error = %err, "Transcription failed, continuing without transcript");
                Vec::new()
            }
        };

        let prompt_transcript = usable_transcript(&transcript, info.duration);
        cancel.check()?;

        let frames_dir = item_temp.join("frames");
        let frames = self
            .ctx
            .media
            .extract_keyframes(media_file, &info, item_temp, &frames_dir)
            .await?;
        tracing::info!(frames = frames.len(), item_index, "Keyframes extracted");
        cancel.check()?;

        let analyzer_ctx = AnalyzerContext {
            platform: platform(url),
            carousel_index: item_index,
            carousel_total: total_items,
            video_duration: info.duration,
            description: description.to_string(),
            tags: tags.to_vec(),
            first_item_hook_hint: total_items > 1 && item_index == 1,
        };

        let analyzer = self.ctx.analyzer.clone();
        let frames_ref = frames.clone();
        let transcript_for_prompt = prompt_transcript.map(|t| t.to_vec());
        let raw_candidates = match retry_with_timeout(
            "analyze",
            DEFAULT_ATTEMPTS,
            self.call_timeout(),
            cancel,
            || {
                let analyzer = analyzer.clone();
                let frames = frames_ref.clone();
                let transcript = transcript_for_prompt.clone();
                let ctx = analyzer_ctx.clone();
                async move { analyzer.analyze(&frames, transcript.as_deref(), &ctx).await }
            },
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(err) if !transcript.is_empty() => {
                tracing::warn!(error = %err, "Analyzer failed, using transcript keyword fallback");
                keyword_fallback(&transcript)
            }
            Err(err) => {
                return Err(AppError::AnalyzeFailed(format!(
                    "analyzer failed and no transcript for fallback: {}",
                    err
                )))
            }
        };

        let candidates = normalize_candidates(raw_candidates, info.duration);
        tracing::info!(
            candidates = candidates.len(),
            item_index,
            "Segments normalized"
        );

        let mut created = Vec::new();
        let mut duplicates = 0usize;
        for candidate in &candidates {
            cancel.check()?;
            match self
                .persist_exercise(url, normalized_url, item_index, candidate, media_file, cancel)
                .await?
            {
                PersistOutcome::Created(clip) => created.push(clip),
                PersistOutcome::DuplicateSkipped => duplicates += 1,
            }
        }

        let status = if !created.is_empty() {
            ItemStatus::Processed
        } else if duplicates > 0 {
            ItemStatus::DuplicateSkipped
        } else {
            ItemStatus::NoExercises
        };

        Ok(ItemOutcome {
            report: ItemReport {
                carousel_index: item_index,
                status,
                created: created.len(),
                error: None,
            },
            created,
        })
    }

    /// Per-exercise persistence transaction.
    ///
    /// 1. materialize the clip file,
    /// 2. insert the metadata row with `vector_id = NULL`,
    /// 3. embed and upsert the vector entry under a fresh `vector_id`,
    /// 4. set `vector_id` on the row.
    ///
    /// Rollback on failure at step n undoes steps n-1..1 in reverse order.
    /// A fingerprint hit before step 1 is a silent idempotent skip; a
    /// duplicate insert at step 2 (a concurrent loser) rolls back its own
    /// clip file and reports the same skip.
    async fn persist_exercise(
        &self,
        url: &str,
        normalized_url: &str,
        carousel_index: i32,
        candidate: &Candidate,
        source_media: &Path,
        cancel: &CancelToken,
    ) -> Result<PersistOutcome, AppError> {
        if self
            .ctx
            .exercises
            .find_by_fingerprint(normalized_url, carousel_index, &candidate.name)
            .await?
            .is_some()
        {
            tracing::info!(name = %candidate.name, carousel_index, "Fingerprint hit, skipping");
            return Ok(PersistOutcome::DuplicateSkipped);
        }
        cancel.check()?;

        // Step 1: clip file.
        let clips_dir = self.ctx.config.clips_dir();
        let file_name = self
            .ctx
            .media
            .materialize_clip(
                source_media,
                candidate.start,
                candidate.end,
                &clips_dir,
                &candidate.name,
            )
            .await?;
        let clip_abs = clips_dir.join(&file_name);
        let clip_path = format!("clips/{}", file_name);

        if cancel.is_cancelled() {
            self.remove_clip(&clip_abs).await;
            return Err(AppError::Cancelled);
        }

        // Step 2: metadata row, vector_id still NULL.
        let new_exercise = NewExercise {
            url: url.to_string(),
            normalized_url: normalized_url.to_string(),
            carousel_index,
            name: candidate.name.clone(),
            clip_path: clip_path.clone(),
            start_time: candidate.start,
            end_time: candidate.end,
            how_to: candidate.how_to.clone(),
            benefits: candidate.benefits.clone(),
            counteracts: candidate.counteracts.clone(),
            fitness_level: candidate.fitness_level,
            rounds_reps: candidate.rounds_reps.clone(),
            intensity: candidate.intensity,
        };
        let exercise = match self.ctx.exercises.insert(&new_exercise).await {
            Ok(exercise) => exercise,
            Err(AppError::Duplicate(fingerprint)) => {
                tracing::info!(%fingerprint, "Lost duplicate race, rolling back clip");
                self.remove_clip(&clip_abs).await;
                return Ok(PersistOutcome::DuplicateSkipped);
            }
            Err(err) => {
                self.remove_clip(&clip_abs).await;
                return Err(err);
            }
        };

        if cancel.is_cancelled() {
            self.rollback_row_and_clip(exercise.id, &clip_abs).await;
            return Err(AppError::Cancelled);
        }

        // Step 3: embedding + vector entry under a fresh vector_id.
        let vector_id = Uuid::new_v4();
        let payload = ExercisePayload::from_exercise(&exercise);
        let text = payload.embedding_text(candidate.rounds_reps.as_deref());
        let embedder = self.ctx.embedder.clone();
        let vector = match retry_with_timeout(
            "embed",
            DEFAULT_ATTEMPTS,
            self.call_timeout(),
            cancel,
            || {
                let embedder = embedder.clone();
                let text = text.clone();
                async move { embedder.embed(&text).await }
            },
        )
        .await
        {
            Ok(vector) => vector,
            Err(err) => {
                self.rollback_row_and_clip(exercise.id, &clip_abs).await;
                return Err(err);
            }
        };
        if let Err(err) = self
            .ctx
            .vectors
            .upsert(vector_id, vector, payload)
            .await
        {
            self.rollback_row_and_clip(exercise.id, &clip_abs).await;
            return Err(err);
        }

        // Step 4: close the cross-store link.
        if let Err(err) = self.ctx.exercises.set_vector_id(exercise.id, vector_id).await {
            if let Err(e) = self.ctx.vectors.delete(vector_id).await {
                tracing::error!(error = %e, %vector_id, "Rollback: vector delete failed");
            }
            self.rollback_row_and_clip(exercise.id, &clip_abs).await;
            return Err(err);
        }

        tracing::info!(
            exercise_id = %exercise.id,
            %vector_id,
            name = %exercise.name,
            "Exercise persisted"
        );
        Ok(PersistOutcome::Created(CreatedClip {
            exercise_id: exercise.id,
            name: exercise.name,
            clip_path,
            start_time: exercise.start_time,
            end_time: exercise.end_time,
        }))
    }

    async fn rollback_row_and_clip(&self, exercise_id: Uuid, clip_abs: &Path) {
        if let Err(err) = self.ctx.exercises.delete(exercise_id).await {
            tracing::error!(error = %err, %exercise_id, "Rollback: row delete failed");
        }
        self.remove_clip(clip_abs).await;
    }

    async fn remove_clip(&self, clip_abs: &Path) {
        if let Err(err) = tokio::fs::remove_file(clip_abs).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(error = %err, path = %clip_abs.display(), "Rollback: clip delete failed");
            }
        }
    }
}

struct ProcessItem<'a> {
    url: &'a str,
    normalized_url: &'a str,
    media_file: &'a PathBuf,
    item_index: i32,
    total_items: usize,
    description: &'a str,
    tags: &'a [String],
    item_temp: &'a Path,
    cancel: &'a CancelToken,
}

/// Apply the transcript quality gate plus the duration-agreement check:
/// a transcript whose span disagrees with the video duration by more than
/// 10% is likely looped music captions and is withheld from the analyzer.
fn usable_transcript(
    transcript: &[TranscriptSegment],
    video_duration: f64,
) -> Option<&[TranscriptSegment]> {
    if transcript.is_empty() || !meets_quality_gate(transcript) {
        return None;
    }
    if video_duration > 0.0 {
        let transcript_end = transcript.iter().map(|s| s.end).fold(0.0, f64::max);
        if (transcript_end - video_duration).abs() > video_duration * TRANSCRIPT_DURATION_TOLERANCE
        {
            tracing::info!(
                transcript_end,
                video_duration,
                "Transcript span disagrees with video duration, withholding from analyzer"
            );
            return None;
        }
    }
    Some(transcript)
}
