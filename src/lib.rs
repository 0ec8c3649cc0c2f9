//! PartScout - hybrid retrieval over equipment part catalogs and manuals
//!
//! Two knowledge sources back every answer: an entity graph of parts and
//! models built from catalog CSVs, and a vector-searchable corpus of manual
//! chunks built from the PDFs those catalogs link to.
//!
//! # Architecture
//!
//! - **Ingestion**: entity graph loader + parallel document pipeline
//! - **Query**: parser, hybrid retriever, context assembler, grounding gate
//! - **Stores**: graph and vector protocols with Neo4j / Qdrant backends

pub mod cli;
pub mod config;
pub mod context;
pub mod doctor;
pub mod embedding;
pub mod errors;
pub mod generation;
pub mod ingest;
pub mod query;
pub mod retrieval;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, Result};
