//! Downloader capability.
//!
//! One variant per platform family, all implementing the same contract and
//! failure taxonomy. The core treats downloader output as untrusted: file
//! existence does not imply playability, so everything goes through a probe
//! later in the pipeline.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use repflow_core::{platform, AppError, DownloadErrorKind, Platform};

/// Result of a successful download. For carousels `files` holds one media
/// file per item in stable (posting) order.
#[derive(Debug, Clone)]
pub struct Download {
    pub files: Vec<PathBuf>,
    pub description: String,
    pub tags: Vec<String>,
    pub is_carousel: bool,
    pub item_count: usize,
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download media and metadata for `url` into `temp_dir`. The caller
    /// owns `temp_dir` and deletes it when the pipeline finishes.
    async fn download(&self, url: &str, temp_dir: &Path) -> Result<Download, AppError>;
}

fn download_err(kind: DownloadErrorKind, message: impl Into<String>) -> AppError {
    AppError::DownloadFailed {
        kind,
        message: message.into(),
    }
}

/// Map tool stderr to the download failure taxonomy.
fn classify_tool_failure(stderr: &str) -> DownloadErrorKind {
    let lower = stderr.to_lowercase();
    if lower.contains("unsupported url") || lower.contains("no suitable extractor") {
        DownloadErrorKind::Unsupported
    } else if lower.contains("404")
        || lower.contains("not found")
        || lower.contains("video unavailable")
        || lower.contains("does not exist")
    {
        DownloadErrorKind::NotFound
    } else if lower.contains("login")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("private")
        || lower.contains("sign in")
    {
        DownloadErrorKind::Auth
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("temporary failure")
    {
        DownloadErrorKind::Network
    } else {
        DownloadErrorKind::Decode
    }
}

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov"];

/// Media files in `dir`, sorted by name for stable carousel order.
async fn collect_media_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_media = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_media {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// YouTube / TikTok downloader shelling out to `yt-dlp`.
///
/// Subtitle side-files are kept so the transcriber can reuse them instead of
/// running speech-to-text.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    tool_path: String,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpDownloader {
    pub fn new(tool_path: impl Into<String>) -> Self {
        Self {
            tool_path: tool_path.into(),
        }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    #[tracing::instrument(skip(self, temp_dir))]
    async fn download(&self, url: &str, temp_dir: &Path) -> Result<Download, AppError> {
        tokio::fs::create_dir_all(temp_dir).await?;
        let template = temp_dir.join("%(title).120s.%(ext)s");

        let output = Command::new(&self.tool_path)
            .args([
                "-f",
                "bestvideo+bestaudio/best",
                "--merge-output-format",
                "mp4",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                "en.*",
                "--write-info-json",
                "--no-playlist",
                "-o",
            ])
            .arg(&template)
            .arg(url)
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(download_err(
                classify_tool_failure(&stderr),
                format!("yt-dlp exited with {}: {}", output.status, stderr),
            ));
        }

        let files = collect_media_files(temp_dir).await?;
        if files.is_empty() {
            return Err(download_err(
                DownloadErrorKind::Decode,
                "yt-dlp reported success but produced no media files",
            ));
        }

        let (description, tags) = read_info_json(temp_dir).await;
        Ok(Download {
            item_count: files.len(),
            is_carousel: false,
            files,
            description,
            tags,
        })
    }
}

/// Pull description and tags out of the yt-dlp `.info.json` side-file.
async fn read_info_json(temp_dir: &Path) -> (String, Vec<String>) {
    let Ok(mut entries) = tokio::fs::read_dir(temp_dir).await else {
        return (String::new(), Vec::new());
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.to_string_lossy().ends_with(".info.json") {
            let Ok(raw) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(info) = serde_json::from_slice::<serde_json::Value>(&raw) else {
                continue;
            };
            let description = info["description"]
                .as_str()
                .or_else(|| info["title"].as_str())
                .unwrap_or_default()
                .to_string();
            let tags = info["tags"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            return (description, tags);
        }
    }
    (String::new(), Vec::new())
}

/// Instagram downloader shelling out to the `instaloader` CLI.
///
/// Instaloader downloads every carousel item of a post in one invocation;
/// sorting by filename preserves posting order.
#[derive(Debug, Clone)]
pub struct InstagramDownloader {
    tool_path: String,
}

impl Default for InstagramDownloader {
    fn default() -> Self {
        Self::new("instaloader")
    }
}

impl InstagramDownloader {
    pub fn new(tool_path: impl Into<String>) -> Self {
        Self {
            tool_path: tool_path.into(),
        }
    }
}

#[async_trait]
impl Downloader for InstagramDownloader {
    #[tracing::instrument(skip(self, temp_dir))]
    async fn download(&self, url: &str, temp_dir: &Path) -> Result<Download, AppError> {
        tokio::fs::create_dir_all(temp_dir).await?;

        let output = Command::new(&self.tool_path)
            .arg("--dirname-pattern")
            .arg(temp_dir)
            .args([
                "--filename-pattern",
                "{date_utc:%Y-%m-%d_%H-%M-%S}_UTC_{shortcode}",
                "--no-video-thumbnails",
                "--no-metadata-json",
                "--quiet",
            ])
            .arg(url)
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to spawn instaloader: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(download_err(
                classify_tool_failure(&stderr),
                format!("instaloader exited with {}: {}", output.status, stderr),
            ));
        }

        let files = collect_media_files(temp_dir).await?;
        if files.is_empty() {
            return Err(download_err(
                DownloadErrorKind::Decode,
                "instaloader reported success but produced no video files",
            ));
        }

        let caption = read_caption_file(temp_dir).await;
        let tags = caption
            .split_whitespace()
            .filter(|w| w.starts_with('#'))
            .map(String::from)
            .collect();

        Ok(Download {
            item_count: files.len(),
            is_carousel: files.len() > 1,
            files,
            description: caption,
            tags,
        })
    }
}

/// Instaloader writes the post caption as a `.txt` side-file.
async fn read_caption_file(temp_dir: &Path) -> String {
    let Ok(mut entries) = tokio::fs::read_dir(temp_dir).await else {
        return String::new();
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "txt") {
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                return text.trim().to_string();
            }
        }
    }
    String::new()
}

/// Routes a URL to the downloader for its platform family.
pub struct PlatformDownloader {
    yt_dlp: YtDlpDownloader,
    instagram: InstagramDownloader,
}

impl Default for PlatformDownloader {
    fn default() -> Self {
        Self {
            yt_dlp: YtDlpDownloader::default(),
            instagram: InstagramDownloader::default(),
        }
    }
}

impl PlatformDownloader {
    pub fn new(yt_dlp: YtDlpDownloader, instagram: InstagramDownloader) -> Self {
        Self { yt_dlp, instagram }
    }
}

#[async_trait]
impl Downloader for PlatformDownloader {
    async fn download(&self, url: &str, temp_dir: &Path) -> Result<Download, AppError> {
        match platform(url) {
            Some(Platform::YouTube) | Some(Platform::TikTok) => {
                self.yt_dlp.download(url, temp_dir).await
            }
            Some(Platform::Instagram) => self.instagram.download(url, temp_dir).await,
            None => Err(download_err(
                DownloadErrorKind::Unsupported,
                format!("no downloader for {}", url),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_covers_the_failure_taxonomy() {
        assert_eq!(
            classify_tool_failure("ERROR: Unsupported URL: https://x"),
            DownloadErrorKind::Unsupported
        );
        assert_eq!(
            classify_tool_failure("ERROR: Video unavailable"),
            DownloadErrorKind::NotFound
        );
        assert_eq!(
            classify_tool_failure("This post is private; login required"),
            DownloadErrorKind::Auth
        );
        assert_eq!(
            classify_tool_failure("Connection timed out after 30s"),
            DownloadErrorKind::Network
        );
        assert_eq!(
            classify_tool_failure("something exploded"),
            DownloadErrorKind::Decode
        );
    }

    #[tokio::test]
    async fn collect_media_files_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.mp4", "caption.txt", "thumb.jpg"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        let files = collect_media_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
    }

    #[tokio::test]
    async fn unsupported_platform_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = PlatformDownloader::default();
        let err = downloader
            .download("https://example.com/v/abc", dir.path())
            .await
            .unwrap_err();
        match err {
            AppError::DownloadFailed { kind, .. } => {
                assert_eq!(kind, DownloadErrorKind::Unsupported)
            }
            other => panic!("expected download failure, got {:?}", other),
        }
    }
}
