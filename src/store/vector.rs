//! Qdrant-backed chunk store
//!
//! One record per chunk, keyed by a deterministic point id derived from
//! `(url, page, chunk_index)`, so pipeline re-runs supersede records in
//! place. The collection uses Euclidean distance; reported scores are the
//! raw distances the retriever thresholds against.

use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, r#match::MatchValue, value::Kind,
        vectors_config::Config, with_payload_selector::SelectorOptions, Condition,
        CreateCollection, Distance, FieldCondition, Filter, ListValue, Match, PointStruct,
        RepeatedStrings, SearchPoints, Value as QdrantValue, VectorParams, VectorsConfig,
        WithPayloadSelector,
    },
};
use std::collections::HashMap;

use crate::errors::{EngineError, Result};
use crate::store::ChunkStore;
use crate::types::{Chunk, ChunkHit};

/// Chunk store over a Qdrant collection
pub struct QdrantChunkStore {
    client: QdrantClient,
    collection: String,
}

impl QdrantChunkStore {
    /// Connect and ensure the collection exists with the expected dimension
    pub async fn connect(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| EngineError::RetrievalUnavailable(format!("vector store: {e}")))?;

        let store = Self {
            client,
            collection: collection.to_string(),
        };
        store.init_collection(dimension as u64).await?;

        Ok(store)
    }

    async fn init_collection(&self, dimension: u64) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(store_err)?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.collection.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: dimension,
                            distance: Distance::Euclid.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(store_err)?;
        }

        Ok(())
    }

    /// Number of records currently in the collection
    pub async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(store_err)?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

fn store_err(e: anyhow::Error) -> EngineError {
    EngineError::RetrievalUnavailable(format!("vector store: {e}"))
}

fn string_list(items: &[String]) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::ListValue(ListValue {
            values: items
                .iter()
                .map(|s| QdrantValue::from(s.clone()))
                .collect(),
        })),
    }
}

fn read_string(payload: &HashMap<String, QdrantValue>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match v.kind.as_ref() {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn read_u32(payload: &HashMap<String, QdrantValue>, key: &str) -> u32 {
    payload
        .get(key)
        .and_then(|v| match v.kind.as_ref() {
            Some(Kind::IntegerValue(i)) => u32::try_from(*i).ok(),
            _ => None,
        })
        .unwrap_or(0)
}

fn read_string_list(payload: &HashMap<String, QdrantValue>, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(|v| match v.kind.as_ref() {
            Some(Kind::ListValue(list)) => Some(
                list.values
                    .iter()
                    .filter_map(|item| match item.kind.as_ref() {
                        Some(Kind::StringValue(s)) => Some(s.clone()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl ChunkStore for QdrantChunkStore {
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .map(|chunk| {
                let mut payload: HashMap<String, QdrantValue> = HashMap::new();
                payload.insert("text".to_string(), QdrantValue::from(chunk.text.clone()));
                payload.insert("part_ids".to_string(), string_list(&chunk.part_ids));
                payload.insert("url".to_string(), QdrantValue::from(chunk.url.clone()));
                payload.insert("page".to_string(), QdrantValue::from(chunk.page as i64));
                payload.insert(
                    "chunk_index".to_string(),
                    QdrantValue::from(chunk.chunk_index as i64),
                );

                PointStruct::new(
                    chunk.key().point_id().to_string(),
                    chunk.embedding.clone(),
                    payload,
                )
            })
            .collect();

        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .map_err(store_err)?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        part_ids: &[String],
    ) -> Result<Vec<ChunkHit>> {
        // Scope the search to chunks owned by the named parts; an empty
        // owner set would make the search unscoped, which the retriever
        // never requests.
        let filter = Filter {
            must: vec![Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: "part_ids".to_string(),
                    r#match: Some(Match {
                        match_value: Some(MatchValue::Keywords(RepeatedStrings {
                            strings: part_ids.to_vec(),
                        })),
                    }),
                    ..Default::default()
                })),
            }],
            ..Default::default()
        };

        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: vector.to_vec(),
                limit: top_k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                filter: Some(filter),
                ..Default::default()
            })
            .await
            .map_err(store_err)?;

        let hits = response
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                ChunkHit {
                    part_ids: read_string_list(&payload, "part_ids"),
                    url: read_string(&payload, "url"),
                    page: read_u32(&payload, "page"),
                    chunk_index: read_u32(&payload, "chunk_index"),
                    text: read_string(&payload, "text"),
                    distance: point.score,
                }
            })
            .collect();

        Ok(hits)
    }
}
