//! Answer generation against a local Ollama instance
//!
//! Generation sits outside the retrieval core: its only input is a rendered
//! ContextBundle and an intent-specific instruction template. The grounding
//! gate validates the output after the fact.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::context::ContextBundle;
use crate::errors::{EngineError, Result};
use crate::query::Intent;

/// Generation function over a context bundle
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, bundle: &ContextBundle) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for the Ollama /api/generate endpoint
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn build_prompt(bundle: &ContextBundle) -> String {
        let instruction = match bundle.intent {
            Intent::PartInfo => {
                "Answer the question about this part using only the context below. \
                 State each attribute exactly as given; if an attribute is marked \
                 unavailable, say it is not on record."
            }
            Intent::ModelInfo => {
                "Describe this model's parts using only the context below. List the \
                 part identifiers exactly as given, including any elision note."
            }
            Intent::PdfDetail => {
                "Answer the technical question using only the manual excerpts below. \
                 Quote the manual verbatim where possible and cite the page numbers \
                 shown. If the excerpts do not cover the question, say so."
            }
            Intent::Unknown => {
                "The question did not name a recognizable part or model. Ask the \
                 user to provide a part number or model identifier."
            }
        };

        format!(
            "{instruction}\n\nContext:\n{}\nAnswer:",
            bundle.render()
        )
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, bundle: &ContextBundle) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt: Self::build_prompt(bundle),
            stream: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::Generic(format!(
                "generation backend returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response.trim().to_string())
    }
}
