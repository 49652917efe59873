//! Transcriber capability.
//!
//! Prefers subtitle side-files left next to the media by the downloader
//! (`.vtt`, `.srt`); only when none exist does it invoke the `whisper` CLI.
//! Segments are returned in ascending start order. The orchestrator treats
//! any failure here as an empty transcript.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use repflow_core::models::TranscriptSegment;
use repflow_core::AppError;

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media: &Path) -> Result<Vec<TranscriptSegment>, AppError>;
}

#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    tool_path: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(tool_path: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            tool_path: tool_path.into(),
            model: model.into(),
        }
    }
}

impl Default for WhisperTranscriber {
    fn default() -> Self {
        Self::new("whisper", "base")
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[tracing::instrument(skip(self, media), fields(media = %media.display()))]
    async fn transcribe(&self, media: &Path) -> Result<Vec<TranscriptSegment>, AppError> {
        if let Some(subtitle) = find_subtitle_file(media).await {
            tracing::info!(subtitle = %subtitle.display(), "Reusing subtitle side-file");
            let text = tokio::fs::read_to_string(&subtitle).await?;
            let mut segments = match subtitle.extension().and_then(|e| e.to_str()) {
                Some("vtt") => parse_vtt(&text),
                Some("srt") => parse_srt(&text),
                _ => Vec::new(),
            };
            if !segments.is_empty() {
                segments.sort_by(|a, b| a.start.total_cmp(&b.start));
                return Ok(segments);
            }
        }
        self.run_whisper(media).await
    }
}

impl WhisperTranscriber {
    async fn run_whisper(&self, media: &Path) -> Result<Vec<TranscriptSegment>, AppError> {
        let out_dir = media
            .parent()
            .map(|p| p.join("whisper_out"))
            .unwrap_or_else(|| PathBuf::from("whisper_out"));
        tokio::fs::create_dir_all(&out_dir).await?;

        let output = Command::new(&self.tool_path)
            .arg(media)
            .args(["--model", &self.model, "--output_format", "json", "--output_dir"])
            .arg(&out_dir)
            .args(["--fp16", "False"])
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn whisper: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::Internal(format!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stem = media
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("transcript");
        let json_path = out_dir.join(format!("{}.json", stem));
        let raw = tokio::fs::read(&json_path).await?;
        let value: serde_json::Value = serde_json::from_slice(&raw)?;

        let mut segments: Vec<TranscriptSegment> = value["segments"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| {
                        Some(TranscriptSegment {
                            start: s["start"].as_f64()?,
                            end: s["end"].as_f64()?,
                            text: s["text"].as_str()?.trim().to_string(),
                        })
                    })
                    .filter(|s| !s.text.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(segments)
    }
}

/// Look for a subtitle file next to the media: `<stem>.vtt`, `<stem>.srt`,
/// and language-coded variants like `<stem>.en.vtt`.
async fn find_subtitle_file(media: &Path) -> Option<PathBuf> {
    let dir = media.parent()?;
    let stem = media.file_stem()?.to_str()?;
    let mut candidates = Vec::new();
    for ext in ["vtt", "srt"] {
        candidates.push(dir.join(format!("{}.{}", stem, ext)));
        for lang in ["en", "en-US", "en-GB", "en-orig"] {
            candidates.push(dir.join(format!("{}.{}.{}", stem, lang, ext)));
        }
    }
    for candidate in candidates {
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

/// Parse `HH:MM:SS.mmm`, `MM:SS.mmm`, and the SRT comma variant.
fn parse_timestamp(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    let parts: Vec<&str> = cleaned.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    Some(h * 3600.0 + m * 60.0 + s)
}

fn cue_regex() -> Regex {
    // "00:00:01.000 --> 00:00:04.500" with optional cue settings after.
    Regex::new(r"(?m)^\s*([\d:.,]+)\s+-->\s+([\d:.,]+)").expect("valid cue regex")
}

fn parse_vtt(text: &str) -> Vec<TranscriptSegment> {
    parse_cues(text, true)
}

fn parse_srt(text: &str) -> Vec<TranscriptSegment> {
    parse_cues(text, false)
}

fn parse_cues(text: &str, strip_vtt_tags: bool) -> Vec<TranscriptSegment> {
    let cue = cue_regex();
    let tag = Regex::new(r"<[^>]+>").expect("valid tag regex");
    let mut segments = Vec::new();

    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(caps) = cue.captures(line) else {
            continue;
        };
        let (Some(start), Some(end)) = (parse_timestamp(&caps[1]), parse_timestamp(&caps[2]))
        else {
            continue;
        };
        let mut cue_text = String::new();
        while let Some(&next) = lines.peek() {
            if next.trim().is_empty() || cue.is_match(next) {
                break;
            }
            if !cue_text.is_empty() {
                cue_text.push(' ');
            }
            cue_text.push_str(next.trim());
            lines.next();
        }
        let cue_text = if strip_vtt_tags {
            tag.replace_all(&cue_text, "").to_string()
        } else {
            cue_text
        };
        let cue_text = cue_text.trim().to_string();
        if !cue_text.is_empty() && end > start {
            segments.push(TranscriptSegment {
                start,
                end,
                text: cue_text,
            });
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_variants() {
        assert_eq!(parse_timestamp("00:00:04.500"), Some(4.5));
        assert_eq!(parse_timestamp("01:02:03.250"), Some(3723.25));
        assert_eq!(parse_timestamp("02:03.000"), Some(123.0));
        assert_eq!(parse_timestamp("00:00:04,500"), Some(4.5));
        assert_eq!(parse_timestamp("nonsense"), None);
    }

    #[test]
    fn parse_vtt_extracts_cues_and_strips_tags() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:04.500\nStart in a <b>plank</b>\n\n\
                   00:00:05.000 --> 00:00:08.000\nlower slowly\n";
        let segments = parse_vtt(vtt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Start in a plank");
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[1].end, 8.0);
    }

    #[test]
    fn parse_srt_extracts_cues() {
        let srt = "1\n00:00:01,000 --> 00:00:04,000\nkeep your core tight\n\n\
                   2\n00:00:04,500 --> 00:00:07,000\nbreathe out on the way up\n";
        let segments = parse_srt(srt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "keep your core tight");
        assert_eq!(segments[1].start, 4.5);
    }

    #[test]
    fn empty_and_inverted_cues_are_dropped() {
        let vtt = "WEBVTT\n\n00:00:05.000 --> 00:00:04.000\nbackwards\n\n\
                   00:00:06.000 --> 00:00:07.000\n\n";
        assert!(parse_vtt(vtt).is_empty());
    }

    #[tokio::test]
    async fn subtitle_discovery_prefers_side_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("workout.mp4");
        tokio::fs::write(&media, b"x").await.unwrap();
        tokio::fs::write(dir.path().join("workout.en.vtt"), b"WEBVTT\n")
            .await
            .unwrap();
        let found = find_subtitle_file(&media).await.unwrap();
        assert!(found.to_string_lossy().ends_with("workout.en.vtt"));
    }
}
