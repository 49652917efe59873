//! Configuration module
//!
//! Env-derived configuration shared by the pipeline, stores, and capability
//! providers. One `Config` is built at process start and passed by reference;
//! nothing reads the environment after startup.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 3;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_MAX_DOWNLOAD_RETRIES: u32 = 3;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
/// Idle connections are recycled after this long so the pool survives
/// transient disconnects on long-lived deployments.
const DEFAULT_DB_IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct Config {
    // Stores
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_idle_timeout_secs: u64,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,

    // Capability providers
    pub ai_provider: String,
    pub gemini_api_key: Option<String>,
    pub gemini_api_backup_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub whisper_model: String,

    // Pipeline behavior
    pub max_concurrent_requests: usize,
    pub request_timeout_seconds: u64,
    pub max_download_retries: u32,

    // Filesystem layout
    pub content_root: PathBuf,
    pub temp_root: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            db_idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", DEFAULT_DB_IDLE_TIMEOUT_SECS)?,
            qdrant_url: env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".into()),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok().filter(|s| !s.is_empty()),
            qdrant_collection: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "exercise_clips".into()),
            ai_provider: env::var("AI_PROVIDER").unwrap_or_else(|_| "gemini".into()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
            gemini_api_backup_key: env::var("GEMINI_API_BACKUP_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            whisper_model: env::var("WHISPER_MODEL").unwrap_or_else(|_| "base".into()),
            max_concurrent_requests: parse_env(
                "MAX_CONCURRENT_REQUESTS",
                DEFAULT_MAX_CONCURRENT_REQUESTS,
            )?,
            request_timeout_seconds: parse_env(
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )?,
            max_download_retries: parse_env("MAX_DOWNLOAD_RETRIES", DEFAULT_MAX_DOWNLOAD_RETRIES)?,
            content_root: env::var("CONTENT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage")),
            temp_root: env::var("TEMP_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage/temp")),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }
        if self.request_timeout_seconds == 0 {
            bail!("REQUEST_TIMEOUT_SECONDS must be at least 1");
        }
        if self.database_url.is_empty() {
            bail!("DATABASE_URL must not be empty");
        }
        if self.qdrant_url.is_empty() {
            bail!("QDRANT_URL must not be empty");
        }
        match self.ai_provider.as_str() {
            "gemini" => {
                if self.gemini_api_key.is_none() {
                    bail!("AI_PROVIDER=gemini requires GEMINI_API_KEY");
                }
            }
            other => bail!("Unknown AI_PROVIDER: {}", other),
        }
        Ok(())
    }

    /// Directory that owns all materialized clips. Stored `clip_path`s are
    /// relative to [`Config::content_root`]; this resolves the absolute tree.
    pub fn clips_dir(&self) -> PathBuf {
        self.content_root.join("clips")
    }

    /// Exclusive scratch tree for one pipeline run. The pipeline deletes it
    /// on exit, success or failure.
    pub fn temp_dir_for(&self, job_id: &str) -> PathBuf {
        self.temp_root.join(format!("pipeline_{}", job_id))
    }

    /// Resolve a stored root-relative clip path to an absolute path.
    pub fn resolve_clip_path(&self, clip_path: &str) -> PathBuf {
        self.content_root.join(clip_path)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
