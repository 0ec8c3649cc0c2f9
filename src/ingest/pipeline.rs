//! Document Pipeline: download → extract → chunk → embed → store
//!
//! Each unique manual URL is scheduled exactly once per batch and flows
//! sequentially through the stages; distinct URLs run in parallel up to a
//! bounded worker pool. Every stage is a bulkhead: one failing document
//! never blocks the rest of the batch, and only a fully empty input is an
//! error.

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::IngestionConfig;
use crate::embedding::Embedder;
use crate::errors::{EngineError, Result};
use crate::ingest::chunker::Chunker;
use crate::ingest::downloader::Downloader;
use crate::ingest::extract::extract_page_texts;
use crate::store::ChunkStore;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::types::Chunk;

/// Stage in which a document failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fetch,
    Extract,
    Embed,
    Store,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Embed => "embed",
            Stage::Store => "store",
        };
        write!(f, "{name}")
    }
}

/// One permanently failed URL with the stage and reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFailure {
    pub url: String,
    pub stage: Stage,
    pub reason: String,
}

/// Aggregate outcome of one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineReport {
    pub urls_processed: usize,
    pub urls_failed: usize,
    pub chunks_stored: usize,
    /// Chunks dropped because their embedding batch failed twice
    pub chunks_failed: usize,
    pub failures: Vec<UrlFailure>,
}

/// Collapse (part id, url) pairs so each unique URL is scheduled once,
/// retaining the owning-part fan-out per URL
pub fn dedup_urls<I>(pairs: I) -> BTreeMap<String, BTreeSet<String>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (part_id, url) in pairs {
        let url = url.trim().to_string();
        if url.is_empty() {
            continue;
        }
        map.entry(url).or_default().insert(part_id);
    }
    map
}

pub struct DocumentPipeline {
    downloader: Downloader,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    chunk_store: Arc<dyn ChunkStore>,
    telemetry: TelemetryCollector,
    workers: usize,
    embed_batch_size: usize,
}

struct UrlOutcome {
    url: String,
    chunks_stored: usize,
    chunks_failed: usize,
    error: Option<(Stage, String)>,
}

impl DocumentPipeline {
    pub fn new(
        config: &IngestionConfig,
        embedder: Arc<dyn Embedder>,
        chunk_store: Arc<dyn ChunkStore>,
        telemetry: TelemetryCollector,
    ) -> Result<Self> {
        Ok(Self {
            downloader: Downloader::new(
                config.fetch_attempts,
                Duration::from_secs(config.fetch_timeout_secs),
            )?,
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
            embedder,
            chunk_store,
            telemetry,
            workers: config.effective_workers(),
            embed_batch_size: config.embed_batch_size.max(1),
        })
    }

    /// Process one ingestion batch of unique URLs with their owning parts
    pub async fn process(
        &self,
        url_to_parts: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<PipelineReport> {
        if url_to_parts.is_empty() {
            return Err(EngineError::Validation(
                "document pipeline received an empty input set".to_string(),
            ));
        }

        for url in url_to_parts.keys() {
            self.telemetry.record(TelemetryEvent::UrlScheduled {
                url: url.clone(),
                timestamp: Instant::now(),
            });
        }

        let outcomes: Vec<UrlOutcome> = stream::iter(url_to_parts.iter().map(|(url, parts)| {
            self.process_url(url.clone(), parts.iter().cloned().collect())
        }))
        .buffer_unordered(self.workers)
        .collect()
        .await;

        let mut report = PipelineReport::default();
        for outcome in outcomes {
            match outcome.error {
                Some((stage, reason)) => {
                    report.urls_failed += 1;
                    report.failures.push(UrlFailure {
                        url: outcome.url,
                        stage,
                        reason,
                    });
                }
                None => {
                    report.urls_processed += 1;
                    report.chunks_stored += outcome.chunks_stored;
                    report.chunks_failed += outcome.chunks_failed;
                }
            }
        }

        Ok(report)
    }

    /// One URL, sequentially through fetch → extract → chunk → embed → store
    async fn process_url(&self, url: String, part_ids: Vec<String>) -> UrlOutcome {
        let failed = |stage: Stage, reason: String, telemetry: &TelemetryCollector| {
            telemetry.record(TelemetryEvent::UrlFailed {
                url: url.clone(),
                stage: stage.to_string(),
                reason: reason.clone(),
                timestamp: Instant::now(),
            });
            UrlOutcome {
                url: url.clone(),
                chunks_stored: 0,
                chunks_failed: 0,
                error: Some((stage, reason)),
            }
        };

        // Fetch
        let bytes = match self.downloader.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => return failed(Stage::Fetch, e.to_string(), &self.telemetry),
        };
        self.telemetry.record(TelemetryEvent::UrlFetched {
            url: url.clone(),
            bytes: bytes.len(),
            timestamp: Instant::now(),
        });

        // Extract (CPU-bound, off the async runtime)
        let extract_url = url.clone();
        let pages = match tokio::task::spawn_blocking(move || {
            extract_page_texts(&bytes, &extract_url)
        })
        .await
        {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => return failed(Stage::Extract, e.to_string(), &self.telemetry),
            Err(e) => return failed(Stage::Extract, e.to_string(), &self.telemetry),
        };

        // Chunk, preserving page order so in-page indices stay meaningful
        let mut text_chunks = Vec::new();
        for page in &pages {
            if page.text.is_empty() {
                continue;
            }
            text_chunks.extend(self.chunker.chunk_page(page.page, &page.text));
        }

        if text_chunks.is_empty() {
            // A document with no extractable text is processed, not failed.
            self.telemetry.record(TelemetryEvent::ChunksStored {
                url: url.clone(),
                count: 0,
                timestamp: Instant::now(),
            });
            return UrlOutcome {
                url,
                chunks_stored: 0,
                chunks_failed: 0,
                error: None,
            };
        }

        // Embed in bounded batches; a batch is retried once, then its
        // chunks are marked failed and the rest of the document continues.
        let mut survivors: Vec<Chunk> = Vec::new();
        let mut chunks_failed = 0usize;

        for batch in text_chunks.chunks(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embed_with_retry(texts).await {
                Ok(vectors) => {
                    for (chunk, embedding) in batch.iter().zip(vectors) {
                        survivors.push(Chunk {
                            part_ids: part_ids.clone(),
                            url: url.clone(),
                            page: chunk.page,
                            chunk_index: chunk.chunk_index,
                            text: chunk.text.clone(),
                            embedding,
                        });
                    }
                }
                Err(_) => chunks_failed += batch.len(),
            }
        }

        if survivors.is_empty() && chunks_failed > 0 {
            return failed(
                Stage::Embed,
                format!("all {chunks_failed} chunks failed to embed"),
                &self.telemetry,
            );
        }

        // Store
        if let Err(e) = self.chunk_store.upsert_chunks(&survivors).await {
            return failed(Stage::Store, e.to_string(), &self.telemetry);
        }

        self.telemetry.record(TelemetryEvent::ChunksStored {
            url: url.clone(),
            count: survivors.len(),
            timestamp: Instant::now(),
        });

        UrlOutcome {
            url,
            chunks_stored: survivors.len(),
            chunks_failed,
            error: None,
        }
    }

    async fn embed_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let first = self.embed_batch(texts.clone()).await;
        match first {
            Ok(vectors) => Ok(vectors),
            Err(_) => self.embed_batch(texts).await,
        }
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = self.embedder.clone();
        let expected = texts.len();

        let vectors = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder.embed_batch(&refs)
        })
        .await
        .map_err(|e| EngineError::EmbeddingFailure(e.to_string()))??;

        if vectors.len() != expected {
            return Err(EngineError::EmbeddingFailure(format!(
                "expected {expected} vectors, got {}",
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}
