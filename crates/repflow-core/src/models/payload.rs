//! Vector entry payload.
//!
//! The payload stored alongside each dense vector is a strict subset of the
//! exercise fields needed for retrieval-side filtering, plus the mandatory
//! `database_id` back-reference used to rejoin with the metadata store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::exercise::Exercise;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExercisePayload {
    pub database_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counteracts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<i32>,
}

impl ExercisePayload {
    pub fn from_exercise(exercise: &Exercise) -> Self {
        Self {
            database_id: exercise.id,
            name: exercise.name.clone(),
            how_to: exercise.how_to.clone(),
            benefits: exercise.benefits.clone(),
            counteracts: exercise.counteracts.clone(),
            fitness_level: exercise.fitness_level,
            intensity: exercise.intensity,
        }
    }

    /// Text fed to the embedder for this exercise. Layout keeps the coaching
    /// fields adjacent so level/intensity phrasing survives into the vector.
    pub fn embedding_text(&self, rounds_reps: Option<&str>) -> String {
        let mut text = format!("Exercise: {}\n", self.name);
        if let Some(how_to) = &self.how_to {
            text.push_str(&format!("\nInstructions: {}\n", how_to));
        }
        if let Some(benefits) = &self.benefits {
            text.push_str(&format!("\nBenefits: {}\n", benefits));
        }
        if let Some(counteracts) = &self.counteracts {
            text.push_str(&format!("\nProblems it solves: {}\n", counteracts));
        }
        if let Some(rounds_reps) = rounds_reps {
            text.push_str(&format!("\nDuration/Reps: {}\n", rounds_reps));
        }
        if let Some(level) = self.fitness_level {
            text.push_str(&format!(
                "\nFitness Level: {}/10 (Beginner: 1-3, Intermediate: 4-7, Advanced: 8-10)\n",
                level
            ));
        }
        if let Some(intensity) = self.intensity {
            text.push_str(&format!(
                "\nIntensity: {}/10 (Low: 1-3, Moderate: 4-7, High: 8-10)\n",
                intensity
            ));
        }
        text.trim_end().to_string()
    }
}
