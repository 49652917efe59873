//! Repflow ingestion pipeline
//!
//! The orchestrator drives one ingestion per job: download, transcribe,
//! keyframes, analyze, normalize, materialize, persist. It is the only
//! component allowed to mutate the three stores (clips tree, metadata rows,
//! vector entries) in concert. The control plane bounds concurrent
//! pipelines and owns job lifecycle; the reconciliation sweep detects and
//! removes cross-store orphans.

pub mod cancel;
pub mod cascade;
pub mod control;
pub mod media_ops;
pub mod normalize;
pub mod orchestrator;
pub mod reconcile;
pub mod retry;

pub use cancel::CancelToken;
pub use cascade::{delete_exercise, CascadeReport};
pub use control::JobControl;
pub use media_ops::{FfmpegMediaProcessor, MediaProcessor};
pub use normalize::normalize_candidates;
pub use orchestrator::{Orchestrator, PipelineContext};
pub use reconcile::{sweep, ReconcileReport};
