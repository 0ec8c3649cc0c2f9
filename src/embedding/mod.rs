//! Embedding function interface
//!
//! The engine treats embedding as a pure function: a batch of texts in, one
//! fixed-length vector per text out, deterministic for a fixed model
//! version. The bundled implementation runs a local BERT model; tests
//! substitute a deterministic stub.

pub mod engine;

pub use engine::CandleEmbedder;

use crate::errors::Result;

/// Pure embedding function over batches of text.
///
/// Implementations are CPU-bound and synchronous; async callers invoke
/// them through `tokio::task::spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// One vector per input text, each of `dimension()` length
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimensionality
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors.pop().ok_or_else(|| {
            crate::errors::EngineError::EmbeddingFailure(
                "embedder returned no vector".to_string(),
            )
        })
    }
}
