//! Ingestion: tabular entity loading and the PDF document pipeline

pub mod chunker;
pub mod downloader;
pub mod extract;
pub mod loader;
pub mod pipeline;
pub mod retry;

pub use chunker::{Chunker, TextChunk};
pub use downloader::Downloader;
pub use loader::{rows_from_csv, GraphLoader, LoadReport};
pub use pipeline::{dedup_urls, DocumentPipeline, PipelineReport};
