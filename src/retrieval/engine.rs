//! Hybrid retrieval: exact graph lookups fused with scoped vector search
//!
//! Entity resolution always runs first; the vector search filter is built
//! from the resolved identifiers, never from the raw query text. A vector
//! search is only issued when at least one resolved entity actually carries
//! a manual URL, so parts without documents never touch the vector store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::errors::{EngineError, Result};
use crate::query::{Intent, ParsedQuery};
use crate::store::{ChunkStore, EntityStore};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::types::{ChunkHit, ModelRecord, PartRecord};

/// Everything one request pulled out of both stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub intent: Intent,
    /// Directly named parts that resolved, with their containing models
    pub parts: Vec<PartRecord>,
    /// Directly named models that resolved, with their part membership
    pub models: Vec<ModelRecord>,
    /// Named identifiers absent from the graph store, collected not fatal
    pub missing_parts: Vec<String>,
    pub missing_models: Vec<String>,
    /// Chunks that passed the distance threshold, best match first
    pub chunks: Vec<ChunkHit>,
    /// Manual URLs belonging to the resolved entities, sorted
    pub citable_urls: Vec<String>,
    pub vector_searched: bool,
    pub discarded_above_threshold: usize,
}

pub struct HybridRetriever {
    entities: Arc<dyn EntityStore>,
    chunks: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
    telemetry: TelemetryCollector,
}

impl HybridRetriever {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        chunks: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
        telemetry: TelemetryCollector,
    ) -> Self {
        Self {
            entities,
            chunks,
            embedder,
            config,
            telemetry,
        }
    }

    /// Resolve entities and, when manuals exist for them, search the
    /// chunk corpus scoped to their part identifiers.
    pub async fn retrieve(&self, query: &ParsedQuery) -> Result<RetrievalResult> {
        let mut result = RetrievalResult {
            intent: query.intent,
            parts: Vec::new(),
            models: Vec::new(),
            missing_parts: Vec::new(),
            missing_models: Vec::new(),
            chunks: Vec::new(),
            citable_urls: Vec::new(),
            vector_searched: false,
            discarded_above_threshold: 0,
        };

        if query.intent == Intent::Unknown {
            return Ok(result);
        }

        // Exact-match entity resolution; a missing identifier is collected,
        // a store failure is fatal for the request.
        let mut allowed_parts: BTreeSet<String> = BTreeSet::new();
        let mut entity_urls: BTreeSet<String> = BTreeSet::new();

        for part_id in &query.part_ids {
            match self.entities.part_by_id(part_id).await? {
                Some(record) => {
                    allowed_parts.insert(record.part.id.clone());
                    entity_urls.extend(record.part.manual_urls.iter().cloned());
                    result.parts.push(record);
                }
                None => result.missing_parts.push(part_id.clone()),
            }
        }

        for model_id in &query.model_ids {
            match self.entities.model_by_id(model_id).await? {
                Some(record) => {
                    for part_id in &record.part_ids {
                        allowed_parts.insert(part_id.clone());
                        if let Some(member) = self.entities.part_by_id(part_id).await? {
                            entity_urls.extend(member.part.manual_urls.iter().cloned());
                        }
                    }
                    result.models.push(record);
                }
                None => result.missing_models.push(model_id.clone()),
            }
        }

        result.citable_urls = entity_urls.iter().cloned().collect();

        // Vector search only when a resolved entity carries a manual.
        if allowed_parts.is_empty() || entity_urls.is_empty() {
            return Ok(result);
        }

        let filter: Vec<String> = allowed_parts.into_iter().collect();
        let vector = self.embed_query(&query.text).await?;

        self.telemetry.record(TelemetryEvent::VectorSearchIssued {
            scoped_parts: filter.len(),
            timestamp: Instant::now(),
        });
        result.vector_searched = true;

        let raw = self
            .chunks
            .search(&vector, self.config.top_k, &filter)
            .await?;

        let raw_count = raw.len();
        let kept: Vec<ChunkHit> = raw
            .into_iter()
            .filter(|hit| hit.distance <= self.config.max_distance)
            .collect();

        result.discarded_above_threshold = raw_count - kept.len();
        if result.discarded_above_threshold > 0 {
            self.telemetry.record(TelemetryEvent::ChunksDiscarded {
                above_threshold: result.discarded_above_threshold,
                timestamp: Instant::now(),
            });
        }
        result.chunks = kept;
        result
            .chunks
            .sort_by(|a, b| match a.distance.partial_cmp(&b.distance) {
                Some(std::cmp::Ordering::Equal) | None => a.key().cmp(&b.key()),
                Some(order) => order,
            });

        Ok(result)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| EngineError::EmbeddingFailure(e.to_string()))?
    }
}
