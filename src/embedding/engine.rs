//! Local embedding engine backed by nomic-embed-text via Candle

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::embedding::Embedder;
use crate::errors::{EngineError, Result};

const MODEL_ID: &str = "nomic-ai/nomic-embed-text-v1.5";
pub const EMBEDDING_DIM: usize = 768;

fn embed_err(msg: impl std::fmt::Display) -> EngineError {
    EngineError::EmbeddingFailure(msg.to_string())
}

/// BERT embedding engine with mean pooling and L2-normalized output
pub struct CandleEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
}

impl CandleEmbedder {
    /// Create a new embedder (downloads model files on first use)
    pub fn new() -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(embed_err)?;
        let repo = api.repo(Repo::new(MODEL_ID.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").map_err(embed_err)?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(embed_err)?;
        let weights_path = repo.get("model.safetensors").map_err(embed_err)?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_contents)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(embed_err)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                &[weights_path],
                candle_core::DType::F32,
                &device,
            )
            .map_err(embed_err)?
        };

        let model = BertModel::load(vb, &config).map_err(embed_err)?;

        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device,
        })
    }

    /// Mean pooling over the sequence dimension, weighted by attention mask
    fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mask_expanded = attention_mask
            .unsqueeze(2)
            .and_then(|m| m.expand(embeddings.shape()))
            .and_then(|m| m.to_dtype(embeddings.dtype()))
            .map_err(embed_err)?;

        let sum_embeddings = (embeddings * &mask_expanded)
            .and_then(|e| e.sum(1))
            .map_err(embed_err)?;
        let sum_mask = mask_expanded
            .sum(1)
            .and_then(|m| m.clamp(1e-9, f64::MAX))
            .map_err(embed_err)?;

        sum_embeddings.broadcast_div(&sum_mask).map_err(embed_err)
    }
}

impl Embedder for CandleEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(embed_err)?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = texts.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            flat_ids[i * max_len..i * max_len + ids.len()].copy_from_slice(ids);
            flat_mask[i * max_len..i * max_len + mask.len()].copy_from_slice(mask);
        }

        let token_ids =
            Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device).map_err(embed_err)?;
        let attention_mask =
            Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device).map_err(embed_err)?;

        let embeddings = self
            .model
            .forward(&token_ids, &attention_mask, None)
            .map_err(embed_err)?;

        let pooled = Self::mean_pool(&embeddings, &attention_mask)?;

        let vectors = pooled.to_vec2::<f32>().map_err(embed_err)?;

        // Normalize so Euclidean distances are comparable across documents.
        let normalized = vectors
            .into_iter()
            .map(|v| {
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    v.into_iter().map(|x| x / norm).collect()
                } else {
                    v
                }
            })
            .collect();

        Ok(normalized)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_embed_single_text() {
        let engine = CandleEmbedder::new().expect("Failed to create engine");
        let embedding = engine.embed("Hello world").expect("Failed to embed");
        assert_eq!(embedding.len(), EMBEDDING_DIM);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_embed_batch_normalized() {
        let engine = CandleEmbedder::new().expect("Failed to create engine");
        let embeddings = engine
            .embed_batch(&["installation procedure", "bearing assembly"])
            .expect("Failed to embed batch");
        assert_eq!(embeddings.len(), 2);
        for v in embeddings {
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-3);
        }
    }
}
