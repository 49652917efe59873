//! Prompt assembly for the multimodal analyzer.
//!
//! The prompt enforces the analyzer output invariants: minimum 3.5 s
//! segments, no overlapping emissions, flow-or-components, empty list over
//! fabrication, confidence in [0, 1].

use repflow_core::models::{Keyframe, TranscriptSegment};

use super::AnalyzerContext;

pub(crate) fn build_analysis_prompt(
    ctx: &AnalyzerContext,
    transcript: Option<&[TranscriptSegment]>,
    frames: &[Keyframe],
) -> String {
    let transcript_section = match transcript {
        Some(segments) if !segments.is_empty() => {
            let mut lines = String::new();
            for segment in segments {
                lines.push_str(&format!(
                    "[{:.1}s - {:.1}s] {}\n",
                    segment.start, segment.end, segment.text
                ));
            }
            lines
        }
        _ => "None (music / silent video)".to_string(),
    };

    let frame_lines: Vec<String> = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            format!(
                "{}. Cut {}, Time {:.3}s",
                i + 1,
                frame.meta.cut_index,
                frame.meta.timestamp_secs()
            )
        })
        .collect();
    let frame_section = if frame_lines.is_empty() {
        "No frames available".to_string()
    } else {
        frame_lines.join("\n")
    };

    let carousel_section = if ctx.carousel_total > 1 {
        build_carousel_section(ctx)
    } else {
        String::new()
    };

    format!(
        r#"You are an expert in exercise video segmentation. Analyze the attached video frames, the cut/timestamp labels, the transcript (when available), and the video description to identify discrete exercise segments.

For each frame, decide:
- Does it show a full single exercise or a continuous sequence (flow)?
- Is there sustained, visible movement of at least 3.5 seconds?
- Is it a demonstration, a transition, or overlaid-text filler?

Keep a segment only when the movement is sustained (3.5s or longer), visually instructive, and unique among the segments you emit. Skip montages, transitions, text-obstructed intros, and repeated content. Anchor start_time and end_time to the frame timestamps listed below.

Rules for the output:
- Emit non-overlapping segments only. When a flow is present, emit either the whole flow or its components, never both for the same range.
- If no exercise is present, return an empty list. Never fabricate.
- confidence_score must be between 0 and 1.
- rounds_reps must always carry a clear, actionable recommendation (e.g. "Perform 10-12 controlled reps per side, resting 30 seconds between sets."). If the video does not specify one, recommend a typical scheme for the movement as a coach would.

Return JSON only, in this exact shape (numbers for start_time and end_time):

```json
{{
  "exercises": [
    {{
      "exercise_name": "Downward Dog to Upward Dog Flow",
      "start_time": 14.0,
      "end_time": 20.5,
      "how_to": "Start in downward dog, shift through chaturanga into upward dog.",
      "benefits": "Improves spinal mobility and shoulder strength.",
      "counteracts": "Long hours of sitting; releases tension in the lower back.",
      "fitness_level": 3,
      "rounds_reps": "Perform 10-12 controlled reps, resting 30 seconds between sets.",
      "intensity": 4,
      "confidence_score": 0.91
    }}
  ]
}}
```
{carousel_section}
VIDEO METADATA
Description: {description}
Tags: {tags}
Duration: {duration:.1} seconds

TRANSCRIPT
{transcript_section}

FRAME TIMESTAMPS
{frame_section}
"#,
        carousel_section = carousel_section,
        description = if ctx.description.is_empty() {
            "No description"
        } else {
            &ctx.description
        },
        tags = ctx.tags.join(", "),
        duration = ctx.video_duration,
        transcript_section = transcript_section,
        frame_section = frame_section,
    )
}

fn build_carousel_section(ctx: &AnalyzerContext) -> String {
    let mut section = format!(
        "\nCAROUSEL CONTEXT\nThis video is item {} of {} in a carousel post.\n",
        ctx.carousel_index, ctx.carousel_total
    );
    if ctx.first_item_hook_hint {
        section.push_str(
            "First items are often hooks: promotional showreels, title text obstructing \
             the movement, or fast montages with no complete rep. Skip this item unless a \
             full, clearly visible exercise movement is demonstrated.\n",
        );
    } else if ctx.carousel_index as usize == ctx.carousel_total {
        section.push_str(
            "Final items may hold tips, credits, or cool-downs. Include content only when \
             instruction or movement is clear.\n",
        );
    } else {
        section.push_str(
            "Middle items typically contain fully demonstrated exercises; prioritize them \
             for detection.\n",
        );
    }
    section
}

pub(crate) fn build_story_prompt(user_prompt: &str, n: usize) -> String {
    format!(
        r#"You are an expert fitness coach. Given the following user requirements, generate up to {n} distinct, clear, and actionable exercise stories. Each story should describe a specific exercise or movement that would help the user achieve their goals. Be concise and use natural language.

USER REQUIREMENTS: {user_prompt}

Return the stories as a numbered list, one per line."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use repflow_core::models::KeyframeMeta;

    fn ctx(index: i32, total: usize, hook: bool) -> AnalyzerContext {
        AnalyzerContext {
            platform: None,
            carousel_index: index,
            carousel_total: total,
            video_duration: 30.0,
            description: "Leg day".into(),
            tags: vec!["#fitness".into()],
            first_item_hook_hint: hook,
        }
    }

    fn frame(cut: u32, ms: u64) -> Keyframe {
        let meta = KeyframeMeta {
            cut_index: cut,
            frame_number: ms / 33,
            timestamp_ms: ms,
            diff_score: 5,
        };
        Keyframe {
            path: std::path::PathBuf::from(meta.file_name()),
            meta,
        }
    }

    #[test]
    fn single_video_prompt_has_no_carousel_section() {
        let prompt = build_analysis_prompt(&ctx(1, 1, false), None, &[frame(1, 0)]);
        assert!(!prompt.contains("CAROUSEL CONTEXT"));
        assert!(prompt.contains("None (music / silent video)"));
        assert!(prompt.contains("1. Cut 1, Time 0.000s"));
    }

    #[test]
    fn hook_hint_renders_skip_guidance() {
        let prompt = build_analysis_prompt(&ctx(1, 3, true), None, &[]);
        assert!(prompt.contains("item 1 of 3"));
        assert!(prompt.contains("hooks"));
    }

    #[test]
    fn transcript_lines_are_time_annotated() {
        let transcript = vec![TranscriptSegment {
            start: 2.0,
            end: 6.5,
            text: "drop into a deep squat".into(),
        }];
        let prompt = build_analysis_prompt(&ctx(1, 1, false), Some(&transcript), &[]);
        assert!(prompt.contains("[2.0s - 6.5s] drop into a deep squat"));
    }
}
