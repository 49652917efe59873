//! User-curated workout routines.
//!
//! A routine is an ordered sequence of exercise ids. There is deliberately no
//! foreign-key constraint on the ids: exercises may be cascade-deleted after
//! a routine references them, and stale ids are filtered at read time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::exercise::MAX_NAME_LEN;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub exercise_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRoutine {
    pub name: String,
    pub description: Option<String>,
    pub exercise_ids: Vec<Uuid>,
}

impl NewRoutine {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("routine name must not be empty".into());
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(format!("routine name exceeds {} characters", MAX_NAME_LEN));
        }
        if self.exercise_ids.is_empty() {
            return Err("routine must reference at least one exercise".into());
        }
        Ok(())
    }
}
