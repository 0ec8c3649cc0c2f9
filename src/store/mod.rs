//! Store capability interfaces
//!
//! The engine depends on two minimal protocols rather than concrete
//! clients: an entity graph ("upsert node", "upsert edge", "match by
//! identifier / by relationship") and a chunk store ("upsert record with
//! vector + metadata", "filtered nearest-neighbor search"). Either backing
//! technology can be substituted without touching retrieval logic.

pub mod graph;
pub mod memory;
pub mod vector;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{Chunk, ChunkHit, ModelRecord, Part, PartRecord};

/// Graph-store protocol over Part and Model entities
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Create-or-match a model node by identifier
    async fn upsert_model(&self, model_id: &str) -> Result<()>;

    /// Create-or-match a part node, merging scalar attributes (later wins)
    /// and accumulating manual-URL links
    async fn upsert_part(&self, part: &Part) -> Result<()>;

    /// Create-or-match the containment edge between a model and a part
    async fn link_model_part(&self, model_id: &str, part_id: &str) -> Result<()>;

    /// Exact-identifier part lookup with containing models; `None` if absent
    async fn part_by_id(&self, part_id: &str) -> Result<Option<PartRecord>>;

    /// Exact-identifier model lookup with full part membership; `None` if absent
    async fn model_by_id(&self, model_id: &str) -> Result<Option<ModelRecord>>;
}

/// Vector-store protocol over manual chunks
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Idempotent batch upsert keyed by `(url, page, chunk_index)`
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Nearest-neighbor search scoped to chunks whose owning-part set
    /// intersects `part_ids`, returning up to `top_k` hits with distances
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        part_ids: &[String],
    ) -> Result<Vec<ChunkHit>>;
}
