//! Background ingestion job records.
//!
//! Jobs progress monotonically: pending → in_progress → (done | failed).
//! The terminal result payload is structured so callers can render per-item
//! carousel outcomes without reparsing log output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Position in the monotonic progression; transitions may only increase.
    pub fn rank(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::InProgress => 1,
            JobState::Done | JobState::Failed => 2,
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::InProgress => write!(f, "in_progress"),
            JobState::Done => write!(f, "done"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "in_progress" => Ok(JobState::InProgress),
            "done" => Ok(JobState::Done),
            "failed" => Ok(JobState::Failed),
            _ => Err(anyhow::anyhow!("Invalid job state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub state: JobState,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Job {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Job {
            job_id: row.get("job_id"),
            state: row
                .get::<String, _>("state")
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse state: {}", e).into()))?,
            result: row.get("result"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

/// One exercise created by an ingestion, in pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedClip {
    pub exercise_id: Uuid,
    pub name: String,
    pub clip_path: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// `{kind, message}` envelope exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Processed,
    DuplicateSkipped,
    NoExercises,
    Failed,
}

/// Per-carousel-item outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemReport {
    pub carousel_index: i32,
    pub status: ItemStatus,
    pub created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

/// Terminal job result payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    Done {
        processed_clips: Vec<CreatedClip>,
        total_clips: usize,
        items: Vec<ItemReport>,
        processing_time_secs: f64,
    },
    Failed {
        error: ErrorEnvelope,
        items: Vec<ItemReport>,
    },
}

impl JobResult {
    pub fn state(&self) -> JobState {
        match self {
            JobResult::Done { .. } => JobState::Done,
            JobResult::Failed { .. } => JobState::Failed,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
