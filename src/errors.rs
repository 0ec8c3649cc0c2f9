//! Error types for the PartScout retrieval engine
//!
//! One taxonomy covers both phases: ingestion-time failures are aggregated
//! into batch reports, query-time failures surface to the caller.

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input row or request (skip and continue at ingestion time)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity absent from the graph store (collected, partial success)
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// Document download failed after retries
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    /// Document text extraction failed
    #[error("Extraction failed for {url}: {reason}")]
    ExtractionFailure { url: String, reason: String },

    /// Embedding invocation failed after the retry-once bound
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// A backing store is unreachable; fatal to the current request
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Generated output referenced a fact absent from its context bundle
    #[error("Grounding violation: {0}")]
    GroundingViolation(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic errors with context
    #[error("Engine error: {0}")]
    Generic(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Convert anyhow errors to EngineError
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Generic(err.to_string())
    }
}
