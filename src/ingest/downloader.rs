//! Fetch stage: manual document download with timeout and bounded retry

use reqwest::Client;
use std::time::Duration;

use crate::errors::{EngineError, Result};
use crate::ingest::retry::RetryPolicy;

/// Downloads each unique manual URL at most once per pipeline run.
///
/// A failing URL is retried up to the policy bound and then reported as a
/// `FetchFailure`; it never blocks other URLs.
pub struct Downloader {
    client: Client,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Downloader {
    pub fn new(fetch_attempts: u32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EngineError::HttpError)?;

        Ok(Self {
            client,
            retry: RetryPolicy::new(fetch_attempts),
            timeout,
        })
    }

    /// Download one document into memory
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let owned_url = url.to_string();
        let bytes = self
            .retry
            .run(|| {
                let client = self.client.clone();
                let url = owned_url.clone();
                async move { fetch_once(&client, &url).await }
            })
            .await?;

        if !looks_like_pdf(&bytes) {
            return Err(EngineError::FetchFailure {
                url: url.to_string(),
                reason: "response is not a PDF document".to_string(),
            });
        }

        Ok(bytes)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| EngineError::FetchFailure {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::FetchFailure {
            url: url.to_string(),
            reason: format!("status {status}"),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| EngineError::FetchFailure {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    Ok(bytes.to_vec())
}

/// PDF files start with the `%PDF` magic
fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"%PDF"
}
