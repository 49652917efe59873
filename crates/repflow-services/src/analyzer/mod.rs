//! Multimodal analyzer capability.
//!
//! Given keyframes, an optional transcript, and carousel context, the
//! analyzer returns candidate exercise segments with structured coaching
//! fields. Prompt text is an implementation detail behind this boundary;
//! callers only see [`RawCandidate`]s.

mod gemini;
mod prompt;

use async_trait::async_trait;

use repflow_core::models::{Keyframe, RawCandidate, TranscriptSegment};
use repflow_core::{AppError, Platform};

pub use gemini::GeminiAnalyzer;
pub(crate) use prompt::build_story_prompt as story_prompt;

/// Context handed to the analyzer alongside frames and transcript.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    pub platform: Option<Platform>,
    pub carousel_index: i32,
    pub carousel_total: usize,
    pub video_duration: f64,
    pub description: String,
    pub tags: Vec<String>,
    /// Set by the orchestrator for the first item of a carousel: first items
    /// are often hooks or montages and should only yield candidates when a
    /// complete movement is clearly visible.
    pub first_item_hook_hint: bool,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Detect candidate exercise segments. Implementations must uphold the
    /// output invariants: segments >= 3.5 s, no overlapping emissions for
    /// the same movement (a flow or its components, never both), an empty
    /// list rather than fabrication, confidence within [0, 1].
    async fn analyze(
        &self,
        frames: &[Keyframe],
        transcript: Option<&[TranscriptSegment]>,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<RawCandidate>, AppError>;

    /// Text-only completion, used by story generation.
    async fn generate_text(&self, prompt: &str) -> Result<String, AppError>;
}

/// Extract the `exercises` array from a model response that may wrap JSON in
/// code fences or decorate it with prose. Trailing commas and line comments
/// are repaired before giving up.
pub(crate) fn extract_candidates(response_text: &str) -> Result<Vec<RawCandidate>, AppError> {
    let mut body = response_text.trim();
    if let Some(fenced) = body.split("```json").nth(1) {
        body = fenced.split("```").next().unwrap_or(fenced);
    } else if let Some(fenced) = body.split("```").nth(1) {
        body = fenced;
    }
    let body = body.trim();

    let start = body.find('{');
    let end = body.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AppError::AnalyzeFailed(
            "no JSON object in analyzer response".into(),
        ));
    };
    let json_text = &body[start..=end];

    parse_exercises(json_text).or_else(|_| {
        let repaired = repair_json(json_text);
        parse_exercises(&repaired)
            .map_err(|e| AppError::AnalyzeFailed(format!("malformed analyzer JSON: {}", e)))
    })
}

fn parse_exercises(json_text: &str) -> Result<Vec<RawCandidate>, serde_json::Error> {
    #[derive(serde::Deserialize)]
    struct Envelope {
        #[serde(default)]
        exercises: Vec<RawCandidate>,
    }
    serde_json::from_str::<Envelope>(json_text).map(|e| e.exercises)
}

/// Remove line comments and trailing commas, the two malformations models
/// actually produce.
fn repair_json(text: &str) -> String {
    let no_comments = regex::Regex::new(r"(?m)//[^\n]*$")
        .expect("valid comment regex")
        .replace_all(text, "");
    regex::Regex::new(r",\s*([}\]])")
        .expect("valid trailing comma regex")
        .replace_all(&no_comments, "$1")
        .into_owned()
}

/// Keywords recognized by the transcript fallback, lowercase.
const EXERCISE_KEYWORDS: &[&str] = &[
    "push-up",
    "push up",
    "squat",
    "plank",
    "lunge",
    "burpee",
    "jumping jack",
    "mountain climber",
    "sit-up",
    "crunch",
    "bridge",
    "downward dog",
    "warrior",
    "tree pose",
    "sun salutation",
];

fn title_case(keyword: &str) -> String {
    keyword
        .replace('-', " ")
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keyword-based fallback when the analyzer is unavailable.
///
/// Emits a candidate only when a known exercise keyword appears inside a
/// transcript span of at least 3.5 s; confidence is fixed at 0.3 so the
/// normalizer's confidence floor still admits it, barely.
pub fn keyword_fallback(transcript: &[TranscriptSegment]) -> Vec<RawCandidate> {
    let mut candidates = Vec::new();
    for segment in transcript {
        if segment.end - segment.start < 3.5 {
            continue;
        }
        let lower = segment.text.to_lowercase();
        if let Some(keyword) = EXERCISE_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
            let display = title_case(keyword);
            candidates.push(RawCandidate {
                name: display.clone(),
                start_time: Some(segment.start),
                end_time: Some(segment.end),
                how_to: Some(format!(
                    "Perform {} as demonstrated in the video",
                    display.to_lowercase()
                )),
                benefits: Some("Improves strength and fitness".into()),
                counteracts: Some("Sedentary lifestyle".into()),
                fitness_level: Some(5),
                rounds_reps: Some("Follow video instructions".into()),
                intensity: Some(5),
                confidence: Some(0.3),
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_handles_fenced_json() {
        let response = "Here you go:\n```json\n{\"exercises\": [{\"exercise_name\": \"Push-Up\", \
                        \"start_time\": 4.0, \"end_time\": 18.5, \"confidence_score\": 0.82}]}\n```";
        let candidates = extract_candidates(response).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Push-Up");
    }

    #[test]
    fn extract_handles_bare_json_with_prose() {
        let response = "Sure. {\"exercises\": []} Hope that helps!";
        assert!(extract_candidates(response).unwrap().is_empty());
    }

    #[test]
    fn extract_repairs_trailing_commas_and_comments() {
        let response = "{\"exercises\": [\n  // best segment\n  {\"exercise_name\": \"Squat\", \
                        \"start_time\": 1.0, \"end_time\": 9.0,},\n]}";
        let candidates = extract_candidates(response).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Squat");
    }

    #[test]
    fn extract_rejects_non_json() {
        assert!(extract_candidates("I could not find any exercises.").is_err());
    }

    #[test]
    fn fallback_requires_keyword_and_minimum_span() {
        let transcript = vec![
            TranscriptSegment {
                start: 10.0,
                end: 16.0,
                text: "now do a push-up slowly".into(),
            },
            TranscriptSegment {
                start: 16.0,
                end: 18.0,
                text: "squat".into(), // span too short
            },
            TranscriptSegment {
                start: 18.0,
                end: 30.0,
                text: "great job everyone".into(), // no keyword
            },
        ];
        let candidates = keyword_fallback(&transcript);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Push Up");
        assert_eq!(candidates[0].start_time, Some(10.0));
        assert_eq!(candidates[0].end_time, Some(16.0));
        assert_eq!(candidates[0].confidence, Some(0.3));
    }
}
