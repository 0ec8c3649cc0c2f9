//! Entity Graph Loader
//!
//! Turns tabular ingestion rows into Part and Model nodes plus containment
//! edges. Invalid rows are rejected individually and loading continues;
//! within a batch, later attribute values for the same part win.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::errors::{EngineError, Result};
use crate::store::EntityStore;
use crate::types::IngestRow;

/// Outcome of one load batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows_processed: usize,
    pub rows_rejected: usize,
    pub parts_touched: usize,
    pub models_touched: usize,
    pub rejections: Vec<RowRejection>,
    /// Store-write failures, aggregated rather than aborting the batch
    pub failures: Vec<String>,
}

/// One rejected input row with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based position in the input batch
    pub row_number: usize,
    pub reason: String,
}

pub struct GraphLoader {
    store: Arc<dyn EntityStore>,
}

impl GraphLoader {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Load a batch of rows, upserting entities and containment edges.
    ///
    /// Parts are merged in memory first so that later rows overwrite
    /// earlier scalar attributes, then written once per identifier.
    pub async fn load(&self, rows: &[IngestRow]) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut merged_parts = BTreeMap::new();
        let mut models = BTreeSet::new();
        let mut edges = BTreeSet::new();

        for (i, row) in rows.iter().enumerate() {
            let row_number = i + 1;

            let model_id = match row.model_id.as_deref().filter(|s| !s.trim().is_empty()) {
                Some(id) => id.trim().to_string(),
                None => {
                    report.rows_rejected += 1;
                    report.rejections.push(RowRejection {
                        row_number,
                        reason: EngineError::Validation(
                            "missing model identifier".to_string(),
                        )
                        .to_string(),
                    });
                    continue;
                }
            };

            let part = match row
                .part_id
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .and_then(|_| row.to_part())
            {
                Some(part) => part,
                None => {
                    report.rows_rejected += 1;
                    report.rejections.push(RowRejection {
                        row_number,
                        reason: EngineError::Validation(
                            "missing part identifier".to_string(),
                        )
                        .to_string(),
                    });
                    continue;
                }
            };

            models.insert(model_id.clone());
            edges.insert((model_id, part.id.clone()));
            merged_parts
                .entry(part.id.clone())
                .and_modify(|existing: &mut crate::types::Part| existing.merge(&part))
                .or_insert(part);

            report.rows_processed += 1;
        }

        for model_id in &models {
            if let Err(e) = self.store.upsert_model(model_id).await {
                report.failures.push(format!("model {model_id}: {e}"));
            }
        }

        for part in merged_parts.values() {
            if let Err(e) = self.store.upsert_part(part).await {
                report.failures.push(format!("part {}: {e}", part.id));
            }
        }

        for (model_id, part_id) in &edges {
            if let Err(e) = self.store.link_model_part(model_id, part_id).await {
                report
                    .failures
                    .push(format!("edge {model_id}->{part_id}: {e}"));
            }
        }

        report.parts_touched = merged_parts.len();
        report.models_touched = models.len();

        Ok(report)
    }
}

/// Read ingestion rows from a catalog CSV.
///
/// Column mapping follows the catalog export format: `Model` and
/// `Parts Town #` identify the entities (`Part` is the description and the
/// fallback identifier), and every column whose header mentions PDF is
/// treated as a manual URL column.
pub fn rows_from_csv(path: &std::path::Path) -> Result<Vec<IngestRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| EngineError::Validation(format!("cannot read {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| EngineError::Validation(format!("missing CSV header row: {e}")))?
        .clone();

    let cell = |record: &csv::StringRecord, name: &str| -> Option<String> {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| EngineError::Validation(format!("malformed CSV record: {e}")))?;

        let description = cell(&record, "Part");
        let mut row = IngestRow {
            model_id: cell(&record, "Model"),
            part_id: cell(&record, "Parts Town #").or_else(|| description.clone()),
            description,
            manufacturer_number: cell(&record, "Mfr #")
                .or_else(|| cell(&record, "Manufacturer #")),
            price: cell(&record, "Price").and_then(|v| {
                v.trim_start_matches('$').replace(',', "").parse().ok()
            }),
            quantity: cell(&record, "Quantity").and_then(|v| v.parse().ok()),
            unit_of_measure: cell(&record, "Unit of Measure").or_else(|| cell(&record, "UOM")),
            manual_urls: Vec::new(),
        };

        for (i, header) in headers.iter().enumerate() {
            if header.to_uppercase().contains("PDF") {
                if let Some(url) = record.get(i).map(str::trim).filter(|s| !s.is_empty()) {
                    row.manual_urls.push(url.to_string());
                }
            }
        }

        rows.push(row);
    }

    Ok(rows)
}
