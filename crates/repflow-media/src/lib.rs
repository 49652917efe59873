//! Repflow media layer
//!
//! Everything that touches raw video: ffprobe probing, keyframe extraction
//! for analyzer input, and bit-exact clip materialization. External tools
//! (`ffmpeg`, `ffprobe`) are invoked as subprocesses; nothing here links
//! against codec libraries.

pub mod clip;
pub mod keyframes;
pub mod probe;

pub use clip::{short_hash, slug, ClipMaterializer};
pub use keyframes::{KeyframeConfig, KeyframeExtractor};
pub use probe::{MediaInfo, MediaProbe};
