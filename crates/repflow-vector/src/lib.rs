//! Repflow vector store
//!
//! Wraps the Qdrant client behind the [`repflow_core::VectorStore`] seam and
//! provides the category-capped diverse selection used for story retrieval.

pub mod diverse;
pub mod payload;
pub mod store;

pub use diverse::{categorize, diverse_select, MovementCategory};
pub use store::QdrantExerciseStore;

/// Embedding dimension produced by the configured embedder.
pub const EMBEDDING_DIM: usize = 1536;
