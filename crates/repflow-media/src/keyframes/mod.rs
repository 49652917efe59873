//! Keyframe extraction.
//!
//! Chooses the minimum set of frames sufficient for the analyzer to reason
//! about complete movements:
//!
//! 1. one ffmpeg pass decodes the whole video into downscaled grayscale
//!    frames,
//! 2. consecutive-frame difference scores drive adaptive cut detection,
//! 3. each cut segment is densely sampled at 8 fps and pruned down to
//!    change-significant frames,
//! 4. a 1 fps floor / 8 fps ceiling is enforced across the video,
//! 5. surviving timestamps are exported as full-resolution JPEGs named
//!    `cut_{cut}_frame_{frame}_time_{ms}_diff_{score}.jpg`.
//!
//! The extractor does no semantic filtering; interpreting the frames is the
//! analyzer's job.

mod select;

use std::path::{Path, PathBuf};

use image::GrayImage;
use tokio::process::Command;

use repflow_core::models::{Keyframe, KeyframeMeta};
use repflow_core::AppError;

use crate::probe::MediaInfo;
pub use select::SelectConfig;
use select::{
    dense_sample, detect_cuts, enforce_rate_bounds, prune_by_change, segment_boundaries,
    SelectedFrame,
};

/// Width the detection pass downscales to. Differencing is about relative
/// change, not detail; 160 px keeps the decode cheap.
const DETECT_WIDTH: u32 = 160;

#[derive(Debug, Clone, Default)]
pub struct KeyframeConfig {
    pub select: SelectConfig,
}

#[derive(Debug, Clone)]
pub struct KeyframeExtractor {
    ffmpeg_path: String,
    config: KeyframeConfig,
}

impl Default for KeyframeExtractor {
    fn default() -> Self {
        Self::new("ffmpeg", KeyframeConfig::default())
    }
}

impl KeyframeExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, config: KeyframeConfig) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            config,
        }
    }

    /// Extract keyframes for `video` into `frames_dir`. `work_dir` receives
    /// the transient grayscale dump and is removed before returning.
    #[tracing::instrument(skip(self, info, video, work_dir, frames_dir), fields(video = %video.display()))]
    pub async fn extract(
        &self,
        video: &Path,
        info: &MediaInfo,
        work_dir: &Path,
        frames_dir: &Path,
    ) -> Result<Vec<Keyframe>, AppError> {
        tokio::fs::create_dir_all(frames_dir).await?;
        let gray_dir = work_dir.join("gray");
        tokio::fs::create_dir_all(&gray_dir).await?;

        self.dump_gray_frames(video, &gray_dir).await?;

        let fps = info.fps;
        let select_config = self.config.select.clone();
        let gray_dir_blocking = gray_dir.clone();

        let selected = tokio::task::spawn_blocking(move || {
            score_and_select(&gray_dir_blocking, fps, &select_config)
        })
        .await
        .map_err(|e| AppError::Internal(format!("keyframe scoring task panicked: {}", e)))??;

        tracing::info!(
            frames = selected.len(),
            cuts = selected.iter().map(|f| f.cut_index).max().unwrap_or(0),
            "Keyframe selection complete"
        );

        let mut keyframes = Vec::with_capacity(selected.len());
        for frame in &selected {
            let meta = KeyframeMeta {
                cut_index: frame.cut_index,
                frame_number: frame.frame_idx as u64,
                timestamp_ms: frame.timestamp_ms,
                diff_score: frame.diff_score.round() as u32,
            };
            let path = frames_dir.join(meta.file_name());
            self.export_frame(video, frame.timestamp_ms, &path).await?;
            keyframes.push(Keyframe { path, meta });
        }

        tokio::fs::remove_dir_all(&gray_dir).await.ok();
        Ok(keyframes)
    }

    /// Decode the whole video once into numbered grayscale PGM frames.
    async fn dump_gray_frames(&self, video: &Path, gray_dir: &Path) -> Result<(), AppError> {
        let pattern = gray_dir.join("%06d.pgm");
        let output = Command::new(&self.ffmpeg_path)
            .args(["-y", "-v", "error", "-i"])
            .arg(video)
            .args([
                "-vf",
                &format!("scale={}:-2,format=gray", DETECT_WIDTH),
                "-start_number",
                "0",
            ])
            .arg(&pattern)
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn ffmpeg: {}", e)))?;
        if !output.status.success() {
            return Err(AppError::DecodeFailed(format!(
                "ffmpeg frame dump failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    /// Export one full-resolution frame at `timestamp_ms`.
    async fn export_frame(
        &self,
        video: &Path,
        timestamp_ms: u64,
        target: &Path,
    ) -> Result<(), AppError> {
        let ts = format!("{:.3}", timestamp_ms as f64 / 1000.0);
        let output = Command::new(&self.ffmpeg_path)
            .args(["-y", "-v", "error", "-ss", &ts, "-i"])
            .arg(video)
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(target)
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn ffmpeg: {}", e)))?;
        if !output.status.success() || !target.exists() {
            return Err(AppError::DecodeFailed(format!(
                "frame export at {}ms failed: {}",
                timestamp_ms,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

/// Blocking pass: load the grayscale dump, score consecutive differences,
/// and run the selection pipeline.
fn score_and_select(
    gray_dir: &Path,
    fps: f64,
    config: &SelectConfig,
) -> Result<Vec<SelectedFrame>, AppError> {
    let frames = load_gray_frames(gray_dir)?;
    if frames.is_empty() {
        return Err(AppError::DecodeFailed(
            "video decoded to zero frames".into(),
        ));
    }

    let mut scores = Vec::with_capacity(frames.len());
    scores.push(0.0);
    for pair in frames.windows(2) {
        scores.push(mean_abs_diff(&pair[0], &pair[1]));
    }

    let cuts = detect_cuts(&scores, config);
    let boundaries = segment_boundaries(&cuts, frames.len());
    let dense = dense_sample(&boundaries, fps, config);
    let kept = prune_by_change(&dense, &boundaries, fps, |a, b| {
        mean_abs_diff(&frames[a], &frames[b])
    });
    Ok(enforce_rate_bounds(kept, &dense, fps, config))
}

/// Load the numbered PGM dump in order, blurring each frame so sensor noise
/// does not register as change.
fn load_gray_frames(gray_dir: &Path) -> Result<Vec<GrayImage>, AppError> {
    let mut names: Vec<PathBuf> = std::fs::read_dir(gray_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "pgm"))
        .collect();
    names.sort();

    let mut frames = Vec::with_capacity(names.len());
    for path in names {
        let img = image::open(&path)
            .map_err(|e| AppError::DecodeFailed(format!("bad frame {}: {}", path.display(), e)))?
            .to_luma8();
        frames.push(image::imageops::blur(&img, 2.0));
    }
    Ok(frames)
}

/// Mean absolute pixel difference between two equally sized frames, 0..255.
fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 255.0;
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    total as f64 / a.as_raw().len().max(1) as f64
}
