//! Keyframe naming and metadata.
//!
//! Each extracted frame carries its cut index, original frame number,
//! timestamp, and difference score encoded in the filename so downstream
//! consumers can reason about placement without reparsing the video:
//! `cut_{cut}_frame_{frame}_time_{ms}_diff_{score}.jpg`.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframeMeta {
    pub cut_index: u32,
    pub frame_number: u64,
    pub timestamp_ms: u64,
    pub diff_score: u32,
}

impl KeyframeMeta {
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }

    pub fn file_name(&self) -> String {
        format!(
            "cut_{}_frame_{}_time_{}_diff_{}.jpg",
            self.cut_index, self.frame_number, self.timestamp_ms, self.diff_score
        )
    }

    /// Parse metadata back out of a frame filename. Returns `None` for names
    /// that do not follow the convention.
    pub fn parse(file_name: &str) -> Option<KeyframeMeta> {
        let stem = file_name.strip_suffix(".jpg")?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 8
            || parts[0] != "cut"
            || parts[2] != "frame"
            || parts[4] != "time"
            || parts[6] != "diff"
        {
            return None;
        }
        Some(KeyframeMeta {
            cut_index: parts[1].parse().ok()?,
            frame_number: parts[3].parse().ok()?,
            timestamp_ms: parts[5].parse().ok()?,
            diff_score: parts[7].parse().ok()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Keyframe {
    pub path: PathBuf,
    pub meta: KeyframeMeta,
}

impl Keyframe {
    pub fn from_path(path: &Path) -> Option<Keyframe> {
        let meta = KeyframeMeta::parse(path.file_name()?.to_str()?)?;
        Some(Keyframe {
            path: path.to_path_buf(),
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_round_trips() {
        let meta = KeyframeMeta {
            cut_index: 3,
            frame_number: 123,
            timestamp_ms: 14000,
            diff_score: 7,
        };
        let name = meta.file_name();
        assert_eq!(name, "cut_3_frame_123_time_14000_diff_7.jpg");
        assert_eq!(KeyframeMeta::parse(&name), Some(meta));
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert!(KeyframeMeta::parse("thumbnail.jpg").is_none());
        assert!(KeyframeMeta::parse("cut_a_frame_1_time_2_diff_3.jpg").is_none());
        assert!(KeyframeMeta::parse("cut_1_frame_2_time_3_diff_4.png").is_none());
    }
}
