//! Transcript segments and the analyzer-input quality gate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Concatenated transcript text, segments joined by single spaces.
pub fn transcript_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a transcript is substantial enough to hand to the analyzer.
///
/// Music-only captions and looped one-word lyrics must not drive exercise
/// detection: the gate requires at least 20 characters of text and at least
/// 3 distinct alphabetic tokens.
pub fn meets_quality_gate(segments: &[TranscriptSegment]) -> bool {
    let text = transcript_text(segments);
    if text.chars().count() < 20 {
        return false;
    }
    let mut distinct = std::collections::HashSet::new();
    for token in text.split_whitespace() {
        let word: String = token
            .chars()
            .filter(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase();
        if !word.is_empty() {
            distinct.insert(word);
        }
    }
    distinct.len() >= 3
}
