//! Context assembly: turning a retrieval result into a bounded bundle
//!
//! The bundle is a pure data value. Every fact it carries comes from exactly
//! one source record in the retrieval result; a missing attribute is shown
//! as an explicit "unavailable" marker, never interpolated, and chunk texts
//! are carried verbatim, never merged across source chunks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::query::Intent;
use crate::retrieval::RetrievalResult;
use crate::types::ChunkHit;

/// Marker used for a missing attribute
pub const UNAVAILABLE: &str = "unavailable";
/// Note emitted when no resolved entity carries a manual
pub const NO_MANUAL: &str = "PDF manual not available";
/// Note emitted when the search returned nothing within the threshold
pub const NO_RELEVANT_CONTENT: &str = "no relevant manual content";

/// Model part lists longer than this are elided
const MODEL_PART_LIST_LIMIT: usize = 7;
/// How many members are shown when the list is elided
const MODEL_PART_LIST_SHOWN: usize = 5;
/// Chunk excerpts included in a part_info bundle
const PART_EXCERPT_LIMIT: usize = 3;
/// Excerpt length cap for part_info summaries, in characters
const PART_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartSection {
    pub id: String,
    /// Attribute name and value, missing values carry the marker
    pub attributes: Vec<(String, String)>,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub id: String,
    /// First members in deterministic order
    pub listed_parts: Vec<String>,
    /// Members elided beyond the listed ones
    pub remainder: usize,
}

/// Verbatim excerpts from one page of one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcerptSection {
    pub url: String,
    pub page: u32,
    pub excerpts: Vec<String>,
}

/// Intent-specific context document plus the records backing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub intent: Intent,
    pub part_sections: Vec<PartSection>,
    pub model_sections: Vec<ModelSection>,
    pub excerpt_sections: Vec<ExcerptSection>,
    /// URLs the answer may cite, restricted to resolved entities
    pub citable_urls: Vec<String>,
    pub notes: Vec<String>,
}

pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Build the intent-specific bundle; pure, no store access
    pub fn assemble(&self, retrieval: &RetrievalResult) -> ContextBundle {
        let mut bundle = ContextBundle {
            intent: retrieval.intent,
            part_sections: Vec::new(),
            model_sections: Vec::new(),
            excerpt_sections: Vec::new(),
            citable_urls: Vec::new(),
            notes: Vec::new(),
        };

        // Re-validate chunk ownership against the resolved entities even
        // though the retriever's filter should already guarantee it.
        let resolved_parts = resolved_part_ids(retrieval);
        let chunks: Vec<&ChunkHit> = retrieval
            .chunks
            .iter()
            .filter(|hit| hit.part_ids.iter().any(|id| resolved_parts.contains(id)))
            .collect();

        match retrieval.intent {
            Intent::PartInfo => {
                bundle.part_sections = part_sections(retrieval);
                bundle.excerpt_sections =
                    excerpt_sections(&chunks, Some((PART_EXCERPT_LIMIT, PART_EXCERPT_CHARS)));
            }
            Intent::ModelInfo => {
                bundle.model_sections = model_sections(retrieval);
                bundle.excerpt_sections = excerpt_sections(&chunks, None);
            }
            Intent::PdfDetail => {
                // Verbatim excerpts grouped by page, no attribute section.
                bundle.excerpt_sections = excerpt_sections(&chunks, None);
            }
            Intent::Unknown => {}
        }

        bundle.citable_urls = citable_urls(retrieval, &bundle.excerpt_sections);

        for id in &retrieval.missing_parts {
            bundle.notes.push(format!("part {id} not found in catalog"));
        }
        for id in &retrieval.missing_models {
            bundle.notes.push(format!("model {id} not found in catalog"));
        }

        let has_entities = !retrieval.parts.is_empty() || !retrieval.models.is_empty();
        if has_entities && retrieval.citable_urls.is_empty() {
            bundle.notes.push(NO_MANUAL.to_string());
        } else if retrieval.vector_searched && bundle.excerpt_sections.is_empty() {
            bundle.notes.push(NO_RELEVANT_CONTENT.to_string());
        }

        bundle
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn resolved_part_ids(retrieval: &RetrievalResult) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = retrieval
        .parts
        .iter()
        .map(|record| record.part.id.clone())
        .collect();
    for model in &retrieval.models {
        ids.extend(model.part_ids.iter().cloned());
    }
    ids
}

fn part_sections(retrieval: &RetrievalResult) -> Vec<PartSection> {
    retrieval
        .parts
        .iter()
        .map(|record| {
            let part = &record.part;
            let attr = |value: Option<String>| value.unwrap_or_else(|| UNAVAILABLE.to_string());

            PartSection {
                id: part.id.clone(),
                attributes: vec![
                    ("description".to_string(), attr(part.description.clone())),
                    (
                        "manufacturer number".to_string(),
                        attr(part.manufacturer_number.clone()),
                    ),
                    (
                        "price".to_string(),
                        attr(part.price.map(|p| format!("{p:.2}"))),
                    ),
                    (
                        "quantity".to_string(),
                        attr(part.quantity.map(|q| q.to_string())),
                    ),
                    (
                        "unit of measure".to_string(),
                        attr(part.unit_of_measure.clone()),
                    ),
                ],
                models: record.models.clone(),
            }
        })
        .collect()
}

fn model_sections(retrieval: &RetrievalResult) -> Vec<ModelSection> {
    retrieval
        .models
        .iter()
        .map(|model| {
            // Membership is already sorted; elision is deterministic.
            if model.part_ids.len() > MODEL_PART_LIST_LIMIT {
                ModelSection {
                    id: model.id.clone(),
                    listed_parts: model.part_ids[..MODEL_PART_LIST_SHOWN].to_vec(),
                    remainder: model.part_ids.len() - MODEL_PART_LIST_SHOWN,
                }
            } else {
                ModelSection {
                    id: model.id.clone(),
                    listed_parts: model.part_ids.clone(),
                    remainder: 0,
                }
            }
        })
        .collect()
}

/// Group chunk texts by (URL, page), preserving the retriever's ranking
/// within each group. `limit` caps excerpt count and length for summaries.
fn excerpt_sections(
    chunks: &[&ChunkHit],
    limit: Option<(usize, usize)>,
) -> Vec<ExcerptSection> {
    let chunks: Vec<&ChunkHit> = match limit {
        Some((count, _)) => chunks.iter().take(count).copied().collect(),
        None => chunks.to_vec(),
    };

    let mut sections: Vec<ExcerptSection> = Vec::new();
    for hit in chunks {
        let text = match limit {
            Some((_, chars)) => truncate_chars(&hit.text, chars),
            None => hit.text.clone(),
        };

        match sections
            .iter_mut()
            .find(|s| s.url == hit.url && s.page == hit.page)
        {
            Some(section) => section.excerpts.push(text),
            None => sections.push(ExcerptSection {
                url: hit.url.clone(),
                page: hit.page,
                excerpts: vec![text],
            }),
        }
    }

    sections
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// URLs the answer may cite. When excerpts exist, only their source URLs
/// qualify; otherwise the resolved entities' manual URLs are offered.
fn citable_urls(retrieval: &RetrievalResult, sections: &[ExcerptSection]) -> Vec<String> {
    let entity_urls: BTreeSet<&String> = retrieval.citable_urls.iter().collect();

    if sections.is_empty() {
        return retrieval.citable_urls.clone();
    }

    let mut urls: BTreeSet<String> = BTreeSet::new();
    for section in sections {
        if entity_urls.contains(&section.url) {
            urls.insert(section.url.clone());
        }
    }
    urls.into_iter().collect()
}

impl ContextBundle {
    /// Render the bundle as the context block of a generation prompt
    pub fn render(&self) -> String {
        let mut out = String::new();

        for section in &self.part_sections {
            let _ = writeln!(out, "Part {}", section.id);
            for (name, value) in &section.attributes {
                let _ = writeln!(out, "  {name}: {value}");
            }
            if !section.models.is_empty() {
                let _ = writeln!(out, "  used in models: {}", section.models.join(", "));
            }
            out.push('\n');
        }

        for section in &self.model_sections {
            let _ = writeln!(out, "Model {}", section.id);
            if section.listed_parts.is_empty() {
                let _ = writeln!(out, "  parts: none on record");
            } else if section.remainder > 0 {
                let _ = writeln!(
                    out,
                    "  parts: {} and {} more",
                    section.listed_parts.join(", "),
                    section.remainder
                );
            } else {
                let _ = writeln!(out, "  parts: {}", section.listed_parts.join(", "));
            }
            out.push('\n');
        }

        for section in &self.excerpt_sections {
            let _ = writeln!(out, "From {} page {}:", section.url, section.page);
            for excerpt in &section.excerpts {
                let _ = writeln!(out, "  {excerpt}");
            }
            out.push('\n');
        }

        for note in &self.notes {
            let _ = writeln!(out, "Note: {note}");
        }

        if !self.citable_urls.is_empty() {
            let _ = writeln!(out, "Sources: {}", self.citable_urls.join(", "));
        }

        out
    }

    /// Page numbers present in the bundle's excerpts
    pub fn cited_pages(&self) -> BTreeSet<u32> {
        self.excerpt_sections.iter().map(|s| s.page).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkHit, ModelRecord, Part, PartRecord};

    fn base_result(intent: Intent) -> RetrievalResult {
        RetrievalResult {
            intent,
            parts: Vec::new(),
            models: Vec::new(),
            missing_parts: Vec::new(),
            missing_models: Vec::new(),
            chunks: Vec::new(),
            citable_urls: Vec::new(),
            vector_searched: false,
            discarded_above_threshold: 0,
        }
    }

    fn hit(part: &str, url: &str, page: u32, idx: u32, text: &str) -> ChunkHit {
        ChunkHit {
            part_ids: vec![part.to_string()],
            url: url.to_string(),
            page,
            chunk_index: idx,
            text: text.to_string(),
            distance: 0.1,
        }
    }

    #[test]
    fn test_missing_attributes_marked_unavailable() {
        let mut result = base_result(Intent::PartInfo);
        result.parts.push(PartRecord {
            part: Part::new("P1"),
            models: vec![],
        });

        let bundle = ContextAssembler::new().assemble(&result);
        assert_eq!(bundle.part_sections.len(), 1);
        assert!(bundle.part_sections[0]
            .attributes
            .iter()
            .all(|(_, v)| v == UNAVAILABLE));
    }

    #[test]
    fn test_large_model_list_is_elided() {
        let mut result = base_result(Intent::ModelInfo);
        result.models.push(ModelRecord {
            id: "TUD-123".to_string(),
            part_ids: (1..=9).map(|i| format!("P{i}")).collect(),
        });

        let bundle = ContextAssembler::new().assemble(&result);
        let section = &bundle.model_sections[0];
        assert_eq!(section.listed_parts.len(), 5);
        assert_eq!(section.remainder, 4);
        assert!(bundle.render().contains("and 4 more"));
    }

    #[test]
    fn test_small_model_list_is_complete() {
        let mut result = base_result(Intent::ModelInfo);
        result.models.push(ModelRecord {
            id: "TUD-123".to_string(),
            part_ids: (1..=7).map(|i| format!("P{i}")).collect(),
        });

        let bundle = ContextAssembler::new().assemble(&result);
        assert_eq!(bundle.model_sections[0].listed_parts.len(), 7);
        assert_eq!(bundle.model_sections[0].remainder, 0);
    }

    #[test]
    fn test_unrelated_chunks_dropped_on_reassembly() {
        let mut result = base_result(Intent::PdfDetail);
        result.parts.push(PartRecord {
            part: Part::new("P1"),
            models: vec![],
        });
        result.vector_searched = true;
        result.chunks = vec![
            hit("P1", "https://example.com/u.pdf", 1, 0, "belongs here"),
            hit("P9", "https://example.com/x.pdf", 1, 0, "leaked in"),
        ];
        result.citable_urls = vec!["https://example.com/u.pdf".to_string()];

        let bundle = ContextAssembler::new().assemble(&result);
        assert_eq!(bundle.excerpt_sections.len(), 1);
        assert_eq!(bundle.excerpt_sections[0].url, "https://example.com/u.pdf");
        assert_eq!(bundle.citable_urls, vec!["https://example.com/u.pdf"]);
    }

    #[test]
    fn test_no_manual_note_for_part_without_documents() {
        let mut result = base_result(Intent::PdfDetail);
        result.parts.push(PartRecord {
            part: Part::new("P1"),
            models: vec![],
        });

        let bundle = ContextAssembler::new().assemble(&result);
        assert!(bundle.notes.iter().any(|n| n == NO_MANUAL));
        assert!(bundle.citable_urls.is_empty());
    }

    #[test]
    fn test_no_relevant_content_note_after_empty_search() {
        let mut result = base_result(Intent::PdfDetail);
        result.parts.push(PartRecord {
            part: {
                let mut p = Part::new("P1");
                p.manual_urls.push("https://example.com/u.pdf".to_string());
                p
            },
            models: vec![],
        });
        result.citable_urls = vec!["https://example.com/u.pdf".to_string()];
        result.vector_searched = true;

        let bundle = ContextAssembler::new().assemble(&result);
        assert!(bundle.notes.iter().any(|n| n == NO_RELEVANT_CONTENT));
    }

    #[test]
    fn test_pdf_detail_carries_verbatim_text() {
        let mut result = base_result(Intent::PdfDetail);
        result.parts.push(PartRecord {
            part: Part::new("P1"),
            models: vec![],
        });
        result.vector_searched = true;
        let text = "Torque the mounting bolts to 12 Nm before sealing the housing.";
        result.chunks = vec![hit("P1", "https://example.com/u.pdf", 4, 0, text)];
        result.citable_urls = vec!["https://example.com/u.pdf".to_string()];

        let bundle = ContextAssembler::new().assemble(&result);
        assert_eq!(bundle.excerpt_sections[0].excerpts[0], text);
        assert!(bundle.cited_pages().contains(&4));
    }
}
