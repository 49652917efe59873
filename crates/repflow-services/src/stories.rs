//! Exercise story generation.
//!
//! Turns a free-form user prompt into short descriptive "stories", each
//! describing one exercise need, which then drive vector retrieval. Uses
//! the analyzer as a text-only coach; a fixed list covers analyzer outages.

use crate::analyzer::Analyzer;

pub(crate) const FALLBACK_STORIES: &[&str] = &[
    "Hip flexor stretches to improve hip mobility",
    "Core strengthening exercises for handstand preparation",
    "Shoulder and wrist mobility work for handstand support",
    "Progressive handstand practice against a wall",
    "Balance and stability training for handstand progression",
];

/// Generate up to `n` stories for `user_prompt`. Never fails: analyzer
/// errors degrade to the fixed fallback list.
pub async fn generate_stories(analyzer: &dyn Analyzer, user_prompt: &str, n: usize) -> Vec<String> {
    let n = n.clamp(1, 10);
    let prompt = crate::analyzer::story_prompt(user_prompt, n);
    match analyzer.generate_text(&prompt).await {
        Ok(text) => {
            let stories = parse_story_lines(&text, n);
            if stories.is_empty() {
                tracing::warn!("Story generation returned no parseable lines, using fallback");
                fallback(n)
            } else {
                stories
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Story generation failed, using fallback");
            fallback(n)
        }
    }
}

fn fallback(n: usize) -> Vec<String> {
    FALLBACK_STORIES
        .iter()
        .take(n)
        .map(|s| s.to_string())
        .collect()
}

/// Parse a numbered or bulleted list, one story per line.
pub(crate) fn parse_story_lines(text: &str, n: usize) -> Vec<String> {
    let mut stories = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let story = line.trim_start_matches(|c: char| {
            c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | '•' | '*' | ' ')
        });
        if !story.is_empty() {
            stories.push(story.to_string());
        }
        if stories.len() == n {
            break;
        }
    }
    stories
}
