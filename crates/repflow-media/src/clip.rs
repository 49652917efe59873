//! Clip materialization.
//!
//! Extracts a self-contained sub-clip covering `[start, end]` from a source
//! video, then verifies the artifact with a probe before anyone is allowed
//! to reference it. Any partial file is removed on failure.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::process::Command;

use repflow_core::{AppError, MaterializeReason};

use crate::probe::MediaProbe;

/// Probed duration must land within this many seconds of `end - start`.
const DURATION_TOLERANCE_SECS: f64 = 0.25;

const SLUG_MAX_LEN: usize = 80;

/// Lowercase, map every non-alphanumeric run to single underscores, truncate.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_underscore = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
        if out.len() >= SLUG_MAX_LEN {
            break;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("clip");
    }
    out
}

/// Short content hash over (name, source, start) so same-named exercises cut
/// from different places never collide in the shared clips tree.
pub fn short_hash(name: &str, source: &Path, start: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(source.to_string_lossy().as_bytes());
    hasher.update(((start * 1000.0).round() as i64).to_le_bytes());
    let digest = hasher.finalize();
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone)]
pub struct ClipMaterializer {
    ffmpeg_path: String,
    probe: MediaProbe,
}

impl Default for ClipMaterializer {
    fn default() -> Self {
        Self::new("ffmpeg", MediaProbe::default())
    }
}

impl ClipMaterializer {
    pub fn new(ffmpeg_path: impl Into<String>, probe: MediaProbe) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            probe,
        }
    }

    /// Filename a clip for `name` cut from `source` at `start` will get.
    pub fn clip_file_name(name: &str, source: &Path, start: f64) -> String {
        format!("{}_{}.mp4", slug(name), short_hash(name, source, start))
    }

    /// Extract `[start, end]` of `source` into `clips_dir`, verify it, and
    /// return the materialized file name.
    #[tracing::instrument(skip(self, source, clips_dir), fields(source = %source.display()))]
    pub async fn materialize(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        clips_dir: &Path,
        name: &str,
    ) -> Result<String, AppError> {
        let duration = end - start;
        if duration <= 0.0 || start < 0.0 {
            return Err(AppError::MaterializeFailed {
                reason: MaterializeReason::Io,
                message: format!("invalid clip range {}..{}", start, end),
            });
        }
        tokio::fs::create_dir_all(clips_dir)
            .await
            .map_err(|e| AppError::MaterializeFailed {
                reason: MaterializeReason::Io,
                message: format!("cannot create clips dir: {}", e),
            })?;

        let file_name = Self::clip_file_name(name, source, start);
        let target = clips_dir.join(&file_name);

        let output = Command::new(&self.ffmpeg_path)
            .args(["-y", "-v", "error", "-i"])
            .arg(source)
            .args([
                "-ss",
                &format!("{:.3}", start),
                "-t",
                &format!("{:.3}", duration),
                "-c:v",
                "libx264",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
            ])
            .arg(&target)
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn ffmpeg: {}", e)))?;

        if !output.status.success() {
            remove_partial(&target).await;
            return Err(AppError::MaterializeFailed {
                reason: MaterializeReason::ToolExitNonzero,
                message: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        if let Err(err) = self.verify(&target, duration).await {
            remove_partial(&target).await;
            return Err(err);
        }
        Ok(file_name)
    }

    async fn verify(&self, target: &Path, expected_duration: f64) -> Result<(), AppError> {
        let metadata =
            tokio::fs::metadata(target)
                .await
                .map_err(|e| AppError::MaterializeFailed {
                    reason: MaterializeReason::Io,
                    message: format!("clip missing after extraction: {}", e),
                })?;
        if metadata.len() == 0 {
            return Err(AppError::MaterializeFailed {
                reason: MaterializeReason::Io,
                message: "clip file is empty".into(),
            });
        }

        let info = self
            .probe
            .probe(target)
            .await
            .map_err(|e| AppError::MaterializeFailed {
                reason: MaterializeReason::ProbeFailed,
                message: e.to_string(),
            })?;

        if (info.duration - expected_duration).abs() > DURATION_TOLERANCE_SECS {
            return Err(AppError::MaterializeFailed {
                reason: MaterializeReason::DurationMismatch,
                message: format!(
                    "probed {}s, expected {}s (±{}s)",
                    info.duration, expected_duration, DURATION_TOLERANCE_SECS
                ),
            });
        }
        Ok(())
    }
}

async fn remove_partial(target: &Path) {
    if let Err(e) = tokio::fs::remove_file(target).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %target.display(), error = %e, "Failed to remove partial clip");
        }
    }
}
