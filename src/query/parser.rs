//! Query parsing: entity extraction and intent classification
//!
//! Parsing is deterministic and performs no I/O. Identifier extraction uses
//! the lexical shape of part and model codes; intent classification walks an
//! ordered rule list so precedence is auditable rather than implicit.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// Classified purpose of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PartInfo,
    ModelInfo,
    PdfDetail,
    Unknown,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::PartInfo => "part_info",
            Intent::ModelInfo => "model_info",
            Intent::PdfDetail => "pdf_detail",
            Intent::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Result of parsing one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub intent: Intent,
    /// Part identifiers in order of first appearance, duplicates collapsed
    pub part_ids: Vec<String>,
    /// Model identifiers in order of first appearance, duplicates collapsed
    pub model_ids: Vec<String>,
    pub text: String,
}

/// Words and phrases that mark a procedural or technical-detail question
const DETAIL_KEYWORDS: &[&str] = &[
    "install",
    "installation",
    "specification",
    "spec",
    "specs",
    "troubleshoot",
    "troubleshooting",
    "maintenance",
    "maintain",
    "wiring",
    "removal",
    "remove",
    "replace",
    "replacement",
    "grounding",
    "sealing",
    "seal",
    "procedure",
    "instructions",
    "diagram",
    "clearance",
    "dimensions",
    "torque",
];

const DETAIL_PHRASES: &[&str] = &["how to", "how do", "how can", "step by step"];

pub struct QueryParser {
    part_patterns: Vec<Regex>,
    model_patterns: Vec<Regex>,
    explicit_part: Regex,
    word_splitter: Regex,
}

impl QueryParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| EngineError::Generic(format!("invalid pattern {pattern}: {e}")))
        };

        Ok(Self {
            part_patterns: vec![
                // Bare codes like TRNBRG00104 or 1234ABC
                compile(r"\b[A-Z]{2,}\d{3,}[A-Z0-9]*\b")?,
                compile(r"\b\d{4,}[A-Z]+\b")?,
                // Hash-prefixed and keyword-prefixed references
                compile(r"#([A-Za-z0-9]{3,})")?,
                compile(r"(?i)parts?\s+town\s*#?\s*([A-Za-z0-9]+)")?,
                compile(r"(?i)\bpart\s*#?\s*([A-Za-z]+[0-9][A-Za-z0-9]*)")?,
            ],
            model_patterns: vec![
                // Dashed or underscored codes like TUD-123
                compile(r"\b[A-Za-z0-9]+[-_][A-Za-z0-9]+\b")?,
                compile(r"(?i)\bmodel\s+#?\s*([A-Za-z0-9][A-Za-z0-9_-]*)")?,
            ],
            explicit_part: compile(r"(?i)\bparts?(\s+town)?\s*#")?,
            word_splitter: compile(r"[a-z]+")?,
        })
    }

    /// Parse a query; never fails, an unrecognizable query yields `unknown`
    pub fn parse(&self, text: &str) -> ParsedQuery {
        let part_ids = extract_ordered(&self.part_patterns, text);
        let mut model_ids = extract_ordered(&self.model_patterns, text);
        // Hyphenated English ("o-ring", "step-by") matches the dashed shape;
        // real model codes carry at least one digit.
        model_ids.retain(|id| id.chars().any(|c| c.is_ascii_digit()));
        let (part_ids, model_ids) = self.disambiguate(text, part_ids, model_ids);

        let intent = self.classify(text, &part_ids, &model_ids);

        ParsedQuery {
            intent,
            part_ids,
            model_ids,
            text: text.to_string(),
        }
    }

    /// An identifier matched by both shapes counts as a Model unless the
    /// query references it with explicit part phrasing.
    fn disambiguate(
        &self,
        text: &str,
        part_ids: Vec<String>,
        model_ids: Vec<String>,
    ) -> (Vec<String>, Vec<String>) {
        let explicit_part = self.explicit_part.is_match(text);

        if explicit_part {
            let model_ids = model_ids
                .into_iter()
                .filter(|id| !part_ids.contains(id))
                .collect();
            (part_ids, model_ids)
        } else {
            let part_ids = part_ids
                .into_iter()
                .filter(|id| !model_ids.contains(id))
                .collect();
            (part_ids, model_ids)
        }
    }

    /// Ordered rule list; the first rule that matches wins
    fn classify(&self, text: &str, part_ids: &[String], model_ids: &[String]) -> Intent {
        let has_entity = !part_ids.is_empty() || !model_ids.is_empty();

        if has_entity && self.has_detail_keyword(text) {
            return Intent::PdfDetail;
        }
        if !model_ids.is_empty() {
            return Intent::ModelInfo;
        }
        if !part_ids.is_empty() {
            return Intent::PartInfo;
        }
        Intent::Unknown
    }

    fn has_detail_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();

        if DETAIL_PHRASES.iter().any(|p| lower.contains(p)) {
            return true;
        }

        self.word_splitter
            .find_iter(&lower)
            .any(|word| DETAIL_KEYWORDS.contains(&word.as_str()))
    }
}

/// Run every pattern, keeping matches in order of first appearance in the
/// text with duplicates collapsed. Identifiers are normalized to uppercase.
fn extract_ordered(patterns: &[Regex], text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            let m = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = m {
                let id = m.as_str().to_uppercase();
                if !found.iter().any(|(_, existing)| existing == &id) {
                    found.push((m.start(), id));
                }
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser {
        QueryParser::new().unwrap()
    }

    #[test]
    fn test_part_code_yields_part_info() {
        let parsed = parser().parse("What is the price of TRNBRG00104?");
        assert_eq!(parsed.intent, Intent::PartInfo);
        assert_eq!(parsed.part_ids, vec!["TRNBRG00104".to_string()]);
        assert!(parsed.model_ids.is_empty());
    }

    #[test]
    fn test_model_code_yields_model_info() {
        let parsed = parser().parse("Which parts fit model TUD-123?");
        assert_eq!(parsed.intent, Intent::ModelInfo);
        assert_eq!(parsed.model_ids, vec!["TUD-123".to_string()]);
    }

    #[test]
    fn test_detail_keyword_with_entity_wins() {
        let parsed = parser().parse("Installation instructions for TRNBRG00104");
        assert_eq!(parsed.intent, Intent::PdfDetail);
        assert_eq!(parsed.part_ids, vec!["TRNBRG00104".to_string()]);
    }

    #[test]
    fn test_detail_keyword_without_entity_is_unknown() {
        let parsed = parser().parse("How do I install a generic bearing?");
        assert_eq!(parsed.intent, Intent::Unknown);
        assert!(parsed.part_ids.is_empty());
        assert!(parsed.model_ids.is_empty());
    }

    #[test]
    fn test_empty_query_is_unknown() {
        let parsed = parser().parse("");
        assert_eq!(parsed.intent, Intent::Unknown);
    }

    #[test]
    fn test_model_wins_over_part_when_both_present() {
        let parsed = parser().parse("Tell me about TUD-123 and TRNBRG00104");
        // Both identifier kinds extracted; model precedence decides intent.
        assert_eq!(parsed.intent, Intent::ModelInfo);
        assert_eq!(parsed.model_ids, vec!["TUD-123".to_string()]);
        assert_eq!(parsed.part_ids, vec!["TRNBRG00104".to_string()]);
    }

    #[test]
    fn test_explicit_part_phrasing_keeps_part() {
        let parsed = parser().parse("price for parts town #TRNBRG00104");
        assert_eq!(parsed.intent, Intent::PartInfo);
        assert_eq!(parsed.part_ids, vec!["TRNBRG00104".to_string()]);
    }

    #[test]
    fn test_duplicates_collapse_in_first_appearance_order() {
        let parsed = parser().parse("TRNBRG00104 vs ABC12345 vs TRNBRG00104");
        assert_eq!(
            parsed.part_ids,
            vec!["TRNBRG00104".to_string(), "ABC12345".to_string()]
        );
    }

    #[test]
    fn test_intent_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Intent::PdfDetail).unwrap(),
            "\"pdf_detail\""
        );
        assert_eq!(Intent::ModelInfo.to_string(), "model_info");
    }

    #[test]
    fn test_hyphenated_words_are_not_model_codes() {
        let parsed = parser().parse("price of o-ring for TRNBRG00104");
        assert_eq!(parsed.intent, Intent::PartInfo);
        assert_eq!(parsed.part_ids, vec!["TRNBRG00104".to_string()]);
        assert!(parsed.model_ids.is_empty());
    }

    #[test]
    fn test_hash_reference_extracted() {
        let parsed = parser().parse("looking for #TRNBRG00104 today");
        assert_eq!(parsed.part_ids, vec!["TRNBRG00104".to_string()]);
    }
}
