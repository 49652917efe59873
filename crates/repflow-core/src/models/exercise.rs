//! Exercise domain model
//!
//! One extracted movement: temporal bounds into its source video, the
//! materialized clip it exclusively owns, coaching metadata, and the
//! cross-store link to its vector entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum useful movement duration in seconds. Candidates shorter than this
/// are never stored.
pub const MIN_EXERCISE_SECONDS: f64 = 3.5;

/// Maximum clip length in seconds; longer segments are implausible for a
/// single movement and get dropped during normalization.
pub const MAX_EXERCISE_SECONDS: f64 = 60.0;

/// Maximum exercise name length accepted by the store.
pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    pub url: String,
    pub normalized_url: String,
    pub carousel_index: i32,
    pub name: String,
    /// Relative to the configured content root, e.g. `clips/push_up_1a2b3c4d.mp4`.
    pub clip_path: String,
    pub start_time: f64,
    pub end_time: f64,
    pub how_to: Option<String>,
    pub benefits: Option<String>,
    pub counteracts: Option<String>,
    pub fitness_level: Option<i32>,
    pub rounds_reps: Option<String>,
    pub intensity: Option<i32>,
    pub vector_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// The ingestion uniqueness fingerprint.
    pub fn fingerprint(&self) -> (String, i32, String) {
        (
            self.normalized_url.clone(),
            self.carousel_index,
            self.name.clone(),
        )
    }
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Exercise {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Exercise {
            id: row.get("id"),
            url: row.get("url"),
            normalized_url: row.get("normalized_url"),
            carousel_index: row.get("carousel_index"),
            name: row.get("name"),
            clip_path: row.get("clip_path"),
            start_time: row.get("start_time"),
            end_time: row.get("end_time"),
            how_to: row.get("how_to"),
            benefits: row.get("benefits"),
            counteracts: row.get("counteracts"),
            fitness_level: row.get("fitness_level"),
            rounds_reps: row.get("rounds_reps"),
            intensity: row.get("intensity"),
            vector_id: row.get("vector_id"),
            created_at: row.get("created_at"),
        })
    }
}

/// Fields required to insert a new exercise row. `vector_id` starts out NULL
/// and is set in the final step of the persistence transaction.
#[derive(Debug, Clone)]
pub struct NewExercise {
    pub url: String,
    pub normalized_url: String,
    pub carousel_index: i32,
    pub name: String,
    pub clip_path: String,
    pub start_time: f64,
    pub end_time: f64,
    pub how_to: Option<String>,
    pub benefits: Option<String>,
    pub counteracts: Option<String>,
    pub fitness_level: Option<i32>,
    pub rounds_reps: Option<String>,
    pub intensity: Option<i32>,
}

impl NewExercise {
    /// Field-level validation applied before any write.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("exercise name must not be empty".into());
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(format!("exercise name exceeds {} characters", MAX_NAME_LEN));
        }
        if self.carousel_index < 1 {
            return Err("carousel_index must be >= 1".into());
        }
        if self.start_time < 0.0 {
            return Err("start_time must be >= 0".into());
        }
        if self.end_time - self.start_time < MIN_EXERCISE_SECONDS {
            return Err(format!(
                "exercise duration must be >= {}s",
                MIN_EXERCISE_SECONDS
            ));
        }
        if let Some(level) = self.fitness_level {
            if !(0..=10).contains(&level) {
                return Err("fitness_level must be within 0..=10".into());
            }
        }
        if let Some(level) = self.intensity {
            if !(0..=10).contains(&level) {
                return Err("intensity must be within 0..=10".into());
            }
        }
        Ok(())
    }
}

/// Filters used by metadata-side listing.
#[derive(Debug, Clone, Default)]
pub struct ExerciseFilter {
    pub name_contains: Option<String>,
    pub fitness_level_min: Option<i32>,
    pub fitness_level_max: Option<i32>,
    pub intensity_min: Option<i32>,
    pub intensity_max: Option<i32>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}
