//! Repflow capability providers
//!
//! The pipeline consumes four pluggable capabilities behind traits defined
//! here: [`Downloader`], [`Transcriber`], [`Analyzer`], and [`Embedder`].
//! The bundled implementations shell out to `yt-dlp`, `instaloader`, and
//! `whisper`, and speak HTTP to hosted model endpoints. This crate also
//! hosts story generation and the retrieval/curation service.

pub mod analyzer;
pub mod downloader;
pub mod embedder;
pub mod retrieval;
pub mod stories;
pub mod transcriber;

pub use analyzer::{keyword_fallback, Analyzer, AnalyzerContext, GeminiAnalyzer};
pub use downloader::{Download, Downloader, InstagramDownloader, PlatformDownloader, YtDlpDownloader};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use retrieval::RetrievalService;
pub use stories::generate_stories;
pub use transcriber::{Transcriber, WhisperTranscriber};
