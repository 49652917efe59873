//! Candidate exercise segments
//!
//! [`RawCandidate`] mirrors analyzer output: times may arrive as numbers or
//! strings and are coerced leniently. [`Candidate`] is the validated form the
//! normalizer and orchestrator work with.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept a JSON number or a numeric string; anything else becomes `None`
/// and the candidate is rejected during normalization.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64().map(|i| i as i32),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// One candidate segment as emitted by the analyzer, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandidate {
    #[serde(rename = "exercise_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub start_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub how_to: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub counteracts: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub fitness_level: Option<i32>,
    #[serde(default)]
    pub rounds_reps: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub intensity: Option<i32>,
    #[serde(rename = "confidence_score", default, deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
}

/// A validated candidate with numeric temporal bounds.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub how_to: Option<String>,
    pub benefits: Option<String>,
    pub counteracts: Option<String>,
    pub fitness_level: Option<i32>,
    pub rounds_reps: Option<String>,
    pub intensity: Option<i32>,
    pub confidence: f64,
}

impl Candidate {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Intersection-over-union of two candidates' temporal spans.
    pub fn overlap_ratio(&self, other: &Candidate) -> f64 {
        let inter_start = self.start.max(other.start);
        let inter_end = self.end.min(other.end);
        let intersection = (inter_end - inter_start).max(0.0);
        let union = (self.end.max(other.end) - self.start.min(other.start)).max(f64::EPSILON);
        intersection / union
    }

    /// Coerce a raw candidate, rejecting non-numeric or missing bounds.
    pub fn from_raw(raw: RawCandidate) -> Option<Candidate> {
        let start = raw.start_time?;
        let end = raw.end_time?;
        if !start.is_finite() || !end.is_finite() {
            return None;
        }
        Some(Candidate {
            name: raw.name,
            start,
            end,
            how_to: raw.how_to,
            benefits: raw.benefits,
            counteracts: raw.counteracts,
            fitness_level: raw.fitness_level,
            rounds_reps: raw.rounds_reps,
            intensity: raw.intensity,
            confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_candidate_accepts_stringly_times() {
        let raw: RawCandidate = serde_json::from_value(serde_json::json!({
            "exercise_name": "Squat",
            "start_time": "4.0",
            "end_time": 18.5,
            "confidence_score": "0.8"
        }))
        .unwrap();
        let candidate = Candidate::from_raw(raw).unwrap();
        assert_eq!(candidate.start, 4.0);
        assert_eq!(candidate.end, 18.5);
        assert_eq!(candidate.confidence, 0.8);
    }

    #[test]
    fn non_numeric_times_are_rejected() {
        let raw: RawCandidate = serde_json::from_value(serde_json::json!({
            "exercise_name": "Squat",
            "start_time": "four seconds",
            "end_time": 18.5
        }))
        .unwrap();
        assert!(Candidate::from_raw(raw).is_none());
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        let raw: RawCandidate = serde_json::from_value(serde_json::json!({
            "exercise_name": "Squat",
            "start_time": 0.0,
            "end_time": 10.0,
            "confidence_score": 1.7
        }))
        .unwrap();
        assert_eq!(Candidate::from_raw(raw).unwrap().confidence, 1.0);
    }

    #[test]
    fn overlap_ratio_matches_hand_computation() {
        let a = Candidate {
            name: "a".into(),
            start: 10.0,
            end: 20.0,
            how_to: None,
            benefits: None,
            counteracts: None,
            fitness_level: None,
            rounds_reps: None,
            intensity: None,
            confidence: 0.9,
        };
        let mut b = a.clone();
        b.start = 10.5;
        b.end = 21.0;
        // intersection 9.5, union 11.0
        assert!((a.overlap_ratio(&b) - 9.5 / 11.0).abs() < 1e-9);
    }
}
