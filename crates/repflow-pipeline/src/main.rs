//! repflow CLI.
//!
//! Wires configuration, stores, and capability providers, then dispatches
//! one command: schema/collection init, a blocking ingestion, story search,
//! routine management, cascade deletion, job inspection, or the
//! reconciliation sweep.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use repflow_core::models::NewRoutine;
use repflow_core::{Config, JobLedger, RoutineStore};
use repflow_db::{connect_pool, init_schema, ExerciseRepository, JobRepository, RoutineRepository};
use repflow_media::{ClipMaterializer, KeyframeConfig, KeyframeExtractor, MediaProbe};
use repflow_pipeline::{
    delete_exercise, sweep, FfmpegMediaProcessor, JobControl, PipelineContext,
};
use repflow_services::{
    generate_stories, GeminiAnalyzer, OpenAiEmbedder, PlatformDownloader, RetrievalService,
    WhisperTranscriber,
};
use repflow_vector::QdrantExerciseStore;

#[derive(Parser)]
#[command(name = "repflow", about = "Exercise clip extraction and retrieval", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the database schema and vector collection
    Init,
    /// Ingest a video URL and wait for the result
    Ingest { url: String },
    /// Generate stories for a prompt and search exercises for each
    Search {
        prompt: String,
        /// Exercises per story
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Number of stories to generate
        #[arg(long, default_value_t = 3)]
        stories: usize,
    },
    /// Cascade-delete an exercise (row, vector entry, clip file)
    Delete { exercise_id: Uuid },
    /// Inspect a background job
    Job { job_id: String },
    /// Manage workout routines
    Routine {
        #[command(subcommand)]
        command: RoutineCommand,
    },
    /// Find and remove cross-store orphans
    Reconcile {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum RoutineCommand {
    /// Create a routine from an ordered list of exercise ids
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(required = true)]
        exercise_ids: Vec<Uuid>,
    },
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    Delete { routine_id: Uuid },
}

struct App {
    config: Config,
    exercises: Arc<ExerciseRepository>,
    routines: Arc<RoutineRepository>,
    jobs: Arc<JobRepository>,
    vectors: Arc<QdrantExerciseStore>,
    analyzer: Arc<GeminiAnalyzer>,
    embedder: Arc<OpenAiEmbedder>,
}

impl App {
    async fn build() -> Result<Self> {
        let config = Config::from_env().context("invalid configuration")?;
        let pool = connect_pool(&config)
            .await
            .context("cannot connect to database")?;
        let vectors =
            Arc::new(QdrantExerciseStore::connect(&config).context("cannot build qdrant client")?);
        let analyzer = Arc::new(GeminiAnalyzer::from_config(&config)?);
        let embedder = Arc::new(OpenAiEmbedder::from_config(&config)?);
        Ok(Self {
            exercises: Arc::new(ExerciseRepository::new(pool.clone())),
            routines: Arc::new(RoutineRepository::new(pool.clone())),
            jobs: Arc::new(JobRepository::new(pool)),
            vectors,
            analyzer,
            embedder,
            config,
        })
    }

    fn pipeline_context(&self) -> Arc<PipelineContext> {
        let media = FfmpegMediaProcessor::new(
            MediaProbe::default(),
            KeyframeExtractor::new("ffmpeg", KeyframeConfig::default()),
            ClipMaterializer::default(),
        );
        Arc::new(PipelineContext {
            config: self.config.clone(),
            downloader: Arc::new(PlatformDownloader::default()),
            transcriber: Arc::new(WhisperTranscriber::new(
                "whisper",
                self.config.whisper_model.clone(),
            )),
            analyzer: self.analyzer.clone(),
            embedder: self.embedder.clone(),
            media: Arc::new(media),
            exercises: self.exercises.clone(),
            vectors: self.vectors.clone(),
            jobs: self.jobs.clone(),
        })
    }

    fn retrieval(&self) -> RetrievalService {
        RetrievalService::new(
            self.exercises.clone(),
            self.vectors.clone(),
            self.routines.clone(),
            self.embedder.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let app = App::build().await?;

    match cli.command {
        Command::Init => {
            let pool = connect_pool(&app.config).await?;
            init_schema(&pool).await?;
            app.vectors.ensure_collection().await?;
            println!("Schema and vector collection ready");
        }
        Command::Ingest { url } => {
            let control = JobControl::new(app.pipeline_context());
            let (job_id, result) = control.run_blocking(&url).await?;
            println!("job {}", job_id);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Search { prompt, k, stories } => {
            let retrieval = app.retrieval();
            let story_list = generate_stories(app.analyzer.as_ref(), &prompt, stories).await;
            for story in &story_list {
                println!("story: {}", story);
                let exercises = retrieval
                    .search_exercises_for_story(story, k, 0.3)
                    .await?;
                for exercise in exercises {
                    println!(
                        "  {}  {}  [{:.1}s-{:.1}s]  {}",
                        exercise.id,
                        exercise.name,
                        exercise.start_time,
                        exercise.end_time,
                        exercise.clip_path
                    );
                }
            }
        }
        Command::Delete { exercise_id } => {
            let report = delete_exercise(
                app.exercises.as_ref(),
                app.vectors.as_ref(),
                &app.config,
                exercise_id,
            )
            .await?;
            println!(
                "deleted {} (vector removed: {}, clip removed: {})",
                report.exercise.name, report.vector_deleted, report.clip_deleted
            );
        }
        Command::Job { job_id } => match app.jobs.get(&job_id).await? {
            Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
            None => println!("job {} not found", job_id),
        },
        Command::Routine { command } => match command {
            RoutineCommand::Create {
                name,
                description,
                exercise_ids,
            } => {
                let routine = app
                    .routines
                    .create(&NewRoutine {
                        name,
                        description,
                        exercise_ids,
                    })
                    .await?;
                println!("routine {}", routine.id);
            }
            RoutineCommand::List { limit, offset } => {
                for routine in app.routines.list(limit, offset).await? {
                    println!(
                        "{}  {}  ({} exercises)",
                        routine.id,
                        routine.name,
                        routine.exercise_ids.len()
                    );
                }
            }
            RoutineCommand::Delete { routine_id } => {
                let deleted = app.routines.delete(routine_id).await?;
                println!(
                    "{}",
                    if deleted { "deleted" } else { "not found" }
                );
            }
        },
        Command::Reconcile { dry_run } => {
            let report = sweep(
                app.exercises.as_ref(),
                app.vectors.as_ref(),
                &app.config,
                dry_run,
            )
            .await?;
            println!(
                "orphan clips: {:?}\norphan vectors: {:?}\nrows missing vectors: {:?}{}",
                report.orphan_clips,
                report.orphan_vectors,
                report.rows_missing_vectors,
                if dry_run { "\n(dry run, nothing removed)" } else { "" }
            );
        }
    }
    Ok(())
}
