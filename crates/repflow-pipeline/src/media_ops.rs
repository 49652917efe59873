//! Media operations seam.
//!
//! The orchestrator drives probing, keyframe extraction, and clip
//! materialization through this trait; production wires the ffmpeg-backed
//! implementations from `repflow-media`, tests substitute fakes that write
//! real files without spawning subprocesses.

use std::path::Path;

use async_trait::async_trait;

use repflow_core::models::Keyframe;
use repflow_core::AppError;
use repflow_media::{ClipMaterializer, KeyframeExtractor, MediaInfo, MediaProbe};

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, AppError>;

    async fn extract_keyframes(
        &self,
        video: &Path,
        info: &MediaInfo,
        work_dir: &Path,
        frames_dir: &Path,
    ) -> Result<Vec<Keyframe>, AppError>;

    /// Materialize `[start, end]` of `source` into `clips_dir`, returning
    /// the created file name.
    async fn materialize_clip(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        clips_dir: &Path,
        name: &str,
    ) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegMediaProcessor {
    probe: MediaProbe,
    keyframes: KeyframeExtractor,
    materializer: ClipMaterializer,
}

impl FfmpegMediaProcessor {
    pub fn new(
        probe: MediaProbe,
        keyframes: KeyframeExtractor,
        materializer: ClipMaterializer,
    ) -> Self {
        Self {
            probe,
            keyframes,
            materializer,
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegMediaProcessor {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, AppError> {
        self.probe.probe(path).await
    }

    async fn extract_keyframes(
        &self,
        video: &Path,
        info: &MediaInfo,
        work_dir: &Path,
        frames_dir: &Path,
    ) -> Result<Vec<Keyframe>, AppError> {
        self.keyframes
            .extract(video, info, work_dir, frames_dir)
            .await
    }

    async fn materialize_clip(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        clips_dir: &Path,
        name: &str,
    ) -> Result<String, AppError> {
        self.materializer
            .materialize(source, start, end, clips_dir, name)
            .await
    }
}
