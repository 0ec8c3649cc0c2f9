//! Hybrid retrieval over the entity graph and the chunk corpus

pub mod engine;

pub use engine::{HybridRetriever, RetrievalResult};
