//! Core domain types shared across ingestion and retrieval

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalogued equipment part, keyed by its business identifier.
///
/// Immutable once written; re-ingestion overwrites by identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub description: Option<String>,
    pub manufacturer_number: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub unit_of_measure: Option<String>,
    /// Manual document URLs referencing this part
    pub manual_urls: Vec<String>,
}

impl Part {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            manufacturer_number: None,
            price: None,
            quantity: None,
            unit_of_measure: None,
            manual_urls: Vec::new(),
        }
    }

    /// Merge scalar attributes from a later row; later values win,
    /// manual URLs accumulate (deduplicated, order preserved).
    pub fn merge(&mut self, other: &Part) {
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.manufacturer_number.is_some() {
            self.manufacturer_number = other.manufacturer_number.clone();
        }
        if other.price.is_some() {
            self.price = other.price;
        }
        if other.quantity.is_some() {
            self.quantity = other.quantity;
        }
        if other.unit_of_measure.is_some() {
            self.unit_of_measure = other.unit_of_measure.clone();
        }
        for url in &other.manual_urls {
            if !self.manual_urls.contains(url) {
                self.manual_urls.push(url.clone());
            }
        }
    }
}

/// One tabular ingestion input row.
///
/// A valid row names at least a model and a part identifier; everything
/// else is optional. Invalid rows are rejected individually by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRow {
    pub model_id: Option<String>,
    pub part_id: Option<String>,
    pub description: Option<String>,
    pub manufacturer_number: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub unit_of_measure: Option<String>,
    pub manual_urls: Vec<String>,
}

impl IngestRow {
    /// Build the Part this row describes. Requires a part id.
    pub fn to_part(&self) -> Option<Part> {
        let id = self.part_id.clone()?;
        Some(Part {
            id,
            description: self.description.clone(),
            manufacturer_number: self.manufacturer_number.clone(),
            price: self.price,
            quantity: self.quantity,
            unit_of_measure: self.unit_of_measure.clone(),
            manual_urls: self.manual_urls.clone(),
        })
    }
}

/// A part as resolved from the graph store, with its containing models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub part: Part,
    /// Identifiers of models containing this part
    pub models: Vec<String>,
}

/// A model as resolved from the graph store, with full part membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    /// Member part identifiers, sorted for deterministic output
    pub part_ids: Vec<String>,
}

/// Identity of a chunk within the vector store.
///
/// Writes are idempotent keyed by this triple: re-running the pipeline on
/// an already-processed URL supersedes records instead of duplicating them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub url: String,
    pub page: u32,
    pub chunk_index: u32,
}

impl ChunkKey {
    /// Deterministic point id derived from the key
    pub fn point_id(&self) -> Uuid {
        let name = format!("{}#{}#{}", self.url, self.page, self.chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
    }
}

/// A contiguous slice of extracted page text with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifiers of all parts that reference the owning document
    pub part_ids: Vec<String>,
    pub url: String,
    pub page: u32,
    pub chunk_index: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            url: self.url.clone(),
            page: self.page,
            chunk_index: self.chunk_index,
        }
    }
}

/// A chunk returned by similarity search, tagged with its distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub part_ids: Vec<String>,
    pub url: String,
    pub page: u32,
    pub chunk_index: u32,
    pub text: String,
    /// Similarity distance as reported by the vector store (lower is better)
    pub distance: f32,
}

impl ChunkHit {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            url: self.url.clone(),
            page: self.page,
            chunk_index: self.chunk_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_merge_later_wins() {
        let mut base = Part::new("TRNBRG00104");
        base.description = Some("Bearing".to_string());
        base.price = Some(10.0);

        let mut update = Part::new("TRNBRG00104");
        update.price = Some(12.5);
        update.manual_urls = vec!["https://example.com/a.pdf".to_string()];

        base.merge(&update);
        assert_eq!(base.description.as_deref(), Some("Bearing"));
        assert_eq!(base.price, Some(12.5));
        assert_eq!(base.manual_urls.len(), 1);
    }

    #[test]
    fn test_part_merge_urls_deduplicate() {
        let mut base = Part::new("P1");
        base.manual_urls = vec!["https://example.com/a.pdf".to_string()];

        let mut update = Part::new("P1");
        update.manual_urls = vec![
            "https://example.com/a.pdf".to_string(),
            "https://example.com/b.pdf".to_string(),
        ];

        base.merge(&update);
        assert_eq!(base.manual_urls.len(), 2);
    }

    #[test]
    fn test_chunk_key_point_id_deterministic() {
        let key = ChunkKey {
            url: "https://example.com/a.pdf".to_string(),
            page: 3,
            chunk_index: 1,
        };
        assert_eq!(key.point_id(), key.point_id());

        let other = ChunkKey {
            url: "https://example.com/a.pdf".to_string(),
            page: 3,
            chunk_index: 2,
        };
        assert_ne!(key.point_id(), other.point_id());
    }

    #[test]
    fn test_row_to_part_requires_id() {
        let row = IngestRow {
            model_id: Some("TUD-123".to_string()),
            ..Default::default()
        };
        assert!(row.to_part().is_none());

        let row = IngestRow {
            part_id: Some("TRNBRG00104".to_string()),
            ..Default::default()
        };
        assert_eq!(row.to_part().unwrap().id, "TRNBRG00104");
    }
}
