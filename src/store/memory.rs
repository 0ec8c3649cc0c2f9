//! In-memory store implementations
//!
//! Used for test isolation and offline runs. `MemoryChunkStore` performs a
//! brute-force Euclidean scan so its distances match what the Qdrant
//! backend reports for normalized vectors.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::Result;
use crate::store::{ChunkStore, EntityStore};
use crate::types::{Chunk, ChunkHit, ChunkKey, ModelRecord, Part, PartRecord};

/// In-memory entity graph
#[derive(Default)]
pub struct MemoryEntityStore {
    inner: Mutex<GraphState>,
}

#[derive(Default)]
struct GraphState {
    parts: HashMap<String, Part>,
    models: BTreeSet<String>,
    /// model id -> member part ids
    membership: HashMap<String, BTreeSet<String>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct part nodes
    pub fn part_count(&self) -> usize {
        self.inner.lock().unwrap().parts.len()
    }

    /// Number of distinct model nodes
    pub fn model_count(&self) -> usize {
        self.inner.lock().unwrap().models.len()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn upsert_model(&self, model_id: &str) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.models.insert(model_id.to_string());
        state.membership.entry(model_id.to_string()).or_default();
        Ok(())
    }

    async fn upsert_part(&self, part: &Part) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        match state.parts.get_mut(&part.id) {
            Some(existing) => existing.merge(part),
            None => {
                state.parts.insert(part.id.clone(), part.clone());
            }
        }
        Ok(())
    }

    async fn link_model_part(&self, model_id: &str, part_id: &str) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.models.insert(model_id.to_string());
        state
            .parts
            .entry(part_id.to_string())
            .or_insert_with(|| Part::new(part_id));
        state
            .membership
            .entry(model_id.to_string())
            .or_default()
            .insert(part_id.to_string());
        Ok(())
    }

    async fn part_by_id(&self, part_id: &str) -> Result<Option<PartRecord>> {
        let state = self.inner.lock().unwrap();
        let part = match state.parts.get(part_id) {
            Some(part) => part.clone(),
            None => return Ok(None),
        };

        // Sorted so the record matches what the graph backend returns.
        let mut models: Vec<String> = state
            .membership
            .iter()
            .filter(|(_, members)| members.contains(part_id))
            .map(|(model_id, _)| model_id.clone())
            .collect();
        models.sort();

        Ok(Some(PartRecord { part, models }))
    }

    async fn model_by_id(&self, model_id: &str) -> Result<Option<ModelRecord>> {
        let state = self.inner.lock().unwrap();
        if !state.models.contains(model_id) {
            return Ok(None);
        }

        let part_ids = state
            .membership
            .get(model_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();

        Ok(Some(ModelRecord {
            id: model_id.to_string(),
            part_ids,
        }))
    }
}

/// In-memory chunk store with brute-force nearest-neighbor search
#[derive(Default)]
pub struct MemoryChunkStore {
    inner: Mutex<BTreeMap<ChunkKey, Chunk>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn chunk_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// All stored keys, for idempotence assertions
    pub fn keys(&self) -> Vec<ChunkKey> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        for chunk in chunks {
            state.insert(chunk.key(), chunk.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        part_ids: &[String],
    ) -> Result<Vec<ChunkHit>> {
        let state = self.inner.lock().unwrap();

        let mut hits: Vec<ChunkHit> = state
            .values()
            .filter(|chunk| chunk.part_ids.iter().any(|id| part_ids.contains(id)))
            .map(|chunk| ChunkHit {
                part_ids: chunk.part_ids.clone(),
                url: chunk.url.clone(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                distance: euclidean(vector, &chunk.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key().cmp(&b.key()))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_key() {
        let store = MemoryChunkStore::new();
        let chunk = Chunk {
            part_ids: vec!["P1".to_string()],
            url: "https://example.com/a.pdf".to_string(),
            page: 1,
            chunk_index: 0,
            text: "first".to_string(),
            embedding: vec![0.0, 1.0],
        };

        store.upsert_chunks(&[chunk.clone()]).await.unwrap();
        store.upsert_chunks(&[chunk]).await.unwrap();
        assert_eq!(store.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_search_respects_owner_filter() {
        let store = MemoryChunkStore::new();
        let mk = |part: &str, idx: u32| Chunk {
            part_ids: vec![part.to_string()],
            url: "https://example.com/a.pdf".to_string(),
            page: 1,
            chunk_index: idx,
            text: format!("chunk {idx}"),
            embedding: vec![0.0, 1.0],
        };
        store
            .upsert_chunks(&[mk("P1", 0), mk("P2", 1)])
            .await
            .unwrap();

        let hits = store
            .search(&[0.0, 1.0], 10, &["P1".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].part_ids, vec!["P1".to_string()]);
    }

    #[tokio::test]
    async fn test_entity_store_membership() {
        let store = MemoryEntityStore::new();
        store.upsert_model("TUD-123").await.unwrap();
        store.upsert_part(&Part::new("P1")).await.unwrap();
        store.link_model_part("TUD-123", "P1").await.unwrap();

        let record = store.model_by_id("TUD-123").await.unwrap().unwrap();
        assert_eq!(record.part_ids, vec!["P1".to_string()]);

        let part = store.part_by_id("P1").await.unwrap().unwrap();
        assert_eq!(part.models, vec!["TUD-123".to_string()]);
    }

    #[tokio::test]
    async fn test_part_record_models_are_sorted() {
        let store = MemoryEntityStore::new();
        for model in ["ZUD-900", "AUD-100", "MUD-500"] {
            store.link_model_part(model, "P1").await.unwrap();
        }

        let record = store.part_by_id("P1").await.unwrap().unwrap();
        assert_eq!(
            record.models,
            vec![
                "AUD-100".to_string(),
                "MUD-500".to_string(),
                "ZUD-900".to_string()
            ]
        );
    }
}
