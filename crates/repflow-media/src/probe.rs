//! Media probing via ffprobe.
//!
//! File existence does not imply playability; every downloaded or
//! materialized file goes through a probe before the pipeline trusts it.

use std::path::Path;

use tokio::process::Command;

use repflow_core::AppError;

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
}

#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe_path: String,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe a media file. Fails with [`AppError::DecodeFailed`] when the
    /// file has no readable video stream or a non-positive duration.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, AppError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| AppError::InputInvalid(format!("non-UTF8 path: {:?}", path)))?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                path_str,
            ])
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::DecodeFailed(format!(
                "ffprobe rejected {}",
                path.display()
            )));
        }

        let data: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::DecodeFailed(format!("unparseable ffprobe output: {}", e)))?;

        let empty = Vec::new();
        let streams = data["streams"].as_array().unwrap_or(&empty);
        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"] == "video")
            .ok_or_else(|| {
                AppError::DecodeFailed(format!("no video stream in {}", path.display()))
            })?;

        let duration = data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| {
                video_stream["duration"]
                    .as_str()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or(0.0);
        if duration <= 0.0 {
            return Err(AppError::DecodeFailed(format!(
                "non-positive duration for {}",
                path.display()
            )));
        }

        let fps = video_stream["avg_frame_rate"]
            .as_str()
            .and_then(parse_rate)
            .filter(|f| *f > 0.0)
            .or_else(|| {
                video_stream["r_frame_rate"]
                    .as_str()
                    .and_then(parse_rate)
                    .filter(|f| *f > 0.0)
            })
            .unwrap_or(30.0);

        Ok(MediaInfo {
            duration,
            width: video_stream["width"].as_u64().unwrap_or(0) as u32,
            height: video_stream["height"].as_u64().unwrap_or(0) as u32,
            fps,
            has_audio: streams.iter().any(|s| s["codec_type"] == "audio"),
        })
    }
}

/// Parse ffprobe's rational frame rates ("30000/1001" or "25").
fn parse_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => raw.parse().ok(),
    }
}
