//! Source URL handling
//!
//! Canonicalizes incoming video URLs and classifies them by platform family.
//! Classification only produces a carousel *hint*; the downloader makes the
//! final call once it can see how many media items the post actually has.

use url::Url;

use crate::error::AppError;

/// Platform family a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of URL classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Single,
    CarouselCandidate,
    Unsupported,
}

/// Normalize a URL: strip query string and fragment, lowercase scheme and
/// host, preserve the path, no trailing slash. Idempotent.
pub fn normalize(raw: &str) -> Result<String, AppError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| AppError::InputInvalid(format!("unparseable URL {:?}: {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InputInvalid(format!(
            "unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::InputInvalid(format!("URL has no host: {}", raw)))?;

    // Url lowercases scheme and host during parsing; the path keeps its case.
    let path = parsed.path().trim_end_matches('/');
    let port = match parsed.port() {
        Some(p) => format!(":{}", p),
        None => String::new(),
    };
    Ok(format!("{}://{}{}{}", parsed.scheme(), host, port, path))
}

/// Which platform family hosts this URL, if any.
pub fn platform(raw: &str) -> Option<Platform> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    match host {
        "youtube.com" | "m.youtube.com" | "youtu.be" => Some(Platform::YouTube),
        "tiktok.com" | "vm.tiktok.com" => Some(Platform::TikTok),
        "instagram.com" => Some(Platform::Instagram),
        _ => None,
    }
}

/// Classify a URL as a single video, a carousel candidate, or unsupported.
///
/// Instagram `/p/` posts can hold multiple media items and are flagged as
/// carousel candidates; reels and everything on YouTube/TikTok are single.
pub fn classify(raw: &str) -> UrlKind {
    let Some(platform) = platform(raw) else {
        return UrlKind::Unsupported;
    };
    match platform {
        Platform::YouTube | Platform::TikTok => UrlKind::Single,
        Platform::Instagram => {
            let path = Url::parse(raw.trim())
                .map(|u| u.path().to_string())
                .unwrap_or_default();
            if path.starts_with("/p/") {
                UrlKind::CarouselCandidate
            } else {
                UrlKind::Single
            }
        }
    }
}

/// Explicit per-item carousel index when the URL encodes one
/// (Instagram `img_index` query parameter), otherwise `None`.
pub fn carousel_index(raw: &str) -> Option<u32> {
    let parsed = Url::parse(raw.trim()).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "img_index")
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .filter(|idx| *idx >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_query_and_fragment() {
        let got = normalize("https://WWW.Instagram.com/p/AbC123/?img_index=2&utm_source=x#frag")
            .unwrap();
        assert_eq!(got, "https://www.instagram.com/p/AbC123");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("https://www.YouTube.com/watch?v=abc").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_preserves_path_case() {
        let got = normalize("https://youtu.be/DqXyZ9").unwrap();
        assert_eq!(got, "https://youtu.be/DqXyZ9");
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize("not a url").is_err());
        assert!(normalize("ftp://example.com/video").is_err());
    }

    #[test]
    fn classify_platform_families() {
        assert_eq!(classify("https://www.youtube.com/watch?v=a"), UrlKind::Single);
        assert_eq!(classify("https://youtu.be/a"), UrlKind::Single);
        assert_eq!(classify("https://www.tiktok.com/@u/video/1"), UrlKind::Single);
        assert_eq!(
            classify("https://www.instagram.com/reel/AbC/"),
            UrlKind::Single
        );
        assert_eq!(
            classify("https://www.instagram.com/p/AbC/"),
            UrlKind::CarouselCandidate
        );
        assert_eq!(classify("https://example.com/v/abc"), UrlKind::Unsupported);
    }

    #[test]
    fn carousel_index_parses_img_index() {
        assert_eq!(
            carousel_index("https://www.instagram.com/p/AbC/?img_index=3"),
            Some(3)
        );
        assert_eq!(carousel_index("https://www.instagram.com/p/AbC/"), None);
        assert_eq!(
            carousel_index("https://www.instagram.com/p/AbC/?img_index=0"),
            None
        );
    }
}
