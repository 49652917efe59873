//! Repflow Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, URL
//! handling, and store seam traits shared across all repflow components.

pub mod config;
pub mod error;
pub mod models;
pub mod stores;
pub mod url;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, DownloadErrorKind, MaterializeReason};
pub use stores::{CollectionInfo, ExerciseStore, JobLedger, RoutineStore, VectorHit, VectorStore};
pub use url::{carousel_index, classify, normalize, platform, Platform, UrlKind};
