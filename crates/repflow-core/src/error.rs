//! Error types module
//!
//! All errors cross component boundaries as [`AppError`]. Each variant maps to
//! a stable machine-readable kind string that callers receive in job results
//! and CLI output, and carries a retryability flag consumed by the pipeline's
//! backoff loop.

use std::io;

use sqlx::Error as SqlxError;

/// Failure taxonomy for downloader implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadErrorKind {
    Unsupported,
    NotFound,
    Auth,
    Network,
    Decode,
}

impl DownloadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadErrorKind::Unsupported => "unsupported",
            DownloadErrorKind::NotFound => "not_found",
            DownloadErrorKind::Auth => "auth",
            DownloadErrorKind::Network => "network",
            DownloadErrorKind::Decode => "decode",
        }
    }
}

impl std::fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a clip materialization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeReason {
    ToolExitNonzero,
    ProbeFailed,
    DurationMismatch,
    Io,
}

impl MaterializeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterializeReason::ToolExitNonzero => "tool_exit_nonzero",
            MaterializeReason::ProbeFailed => "probe_failed",
            MaterializeReason::DurationMismatch => "duration_mismatch",
            MaterializeReason::Io => "io",
        }
    }
}

impl std::fmt::Display for MaterializeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error("Download failed ({kind}): {message}")]
    DownloadFailed {
        kind: DownloadErrorKind,
        message: String,
    },

    #[error("Media decode failed: {0}")]
    DecodeFailed(String),

    #[error("Analyzer failed: {0}")]
    AnalyzeFailed(String),

    #[error("Embedding failed: {0}")]
    EmbedFailed(String),

    #[error("Duplicate exercise: {0}")]
    Duplicate(String),

    #[error("Clip materialization failed ({reason}): {message}")]
    MaterializeFailed {
        reason: MaterializeReason,
        message: String,
    },

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error kind exposed to callers in `{kind, message}` envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InputInvalid(_) => "input_invalid",
            AppError::DownloadFailed { .. } => "download_failed",
            AppError::DecodeFailed(_) => "decode_failed",
            AppError::AnalyzeFailed(_) => "analyze_failed",
            AppError::EmbedFailed(_) => "persistence_failed",
            AppError::Duplicate(_) => "duplicate",
            AppError::MaterializeFailed { .. } => "materialize_failed",
            AppError::PersistenceFailed(_) => "persistence_failed",
            AppError::NotFound(_) => "input_invalid",
            AppError::Cancelled => "cancelled",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether the pipeline's bounded backoff loop may re-attempt the
    /// operation that produced this error. Only transient external failures
    /// qualify; validation, duplicates, and completed rollbacks do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::DownloadFailed { kind, .. } => *kind == DownloadErrorKind::Network,
            AppError::AnalyzeFailed(_) | AppError::EmbedFailed(_) => true,
            _ => false,
        }
    }

    /// Client-facing envelope used in job results.
    pub fn to_envelope(&self) -> (String, String) {
        (self.kind().to_string(), self.to_string())
    }
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::PersistenceFailed(format!("database error: {}", err))
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
