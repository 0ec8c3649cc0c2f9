//! Grounding gate: post-hoc check that generated output stays inside its
//! context bundle
//!
//! The gate is deliberately conservative. It verifies two checkable claims
//! in the generated text: direct quotations of five or more words must
//! appear verbatim in the bundle, and cited page numbers must belong to
//! pages the bundle actually carries. A violation withholds the response.

use regex::Regex;

use crate::context::assembler::ContextBundle;
use crate::errors::{EngineError, Result};

/// Minimum quoted run length, in words, that triggers verification
const QUOTE_WORD_THRESHOLD: usize = 5;

pub struct GroundingGate {
    quote_pattern: Regex,
    page_pattern: Regex,
}

impl GroundingGate {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| EngineError::Generic(format!("invalid pattern {pattern}: {e}")))
        };

        Ok(Self {
            quote_pattern: compile(r#""([^"]+)""#)?,
            page_pattern: compile(r"(?i)\bpage\s+(\d+)")?,
        })
    }

    /// Verify `generated` against `bundle`; `GroundingViolation` on failure
    pub fn check(&self, bundle: &ContextBundle, generated: &str) -> Result<()> {
        let context = normalize(&bundle.render());

        for caps in self.quote_pattern.captures_iter(generated) {
            let quoted = &caps[1];
            if quoted.split_whitespace().count() < QUOTE_WORD_THRESHOLD {
                continue;
            }
            if !context.contains(&normalize(quoted)) {
                return Err(EngineError::GroundingViolation(format!(
                    "quoted text not present in context: \"{quoted}\""
                )));
            }
        }

        let known_pages = bundle.cited_pages();
        for caps in self.page_pattern.captures_iter(generated) {
            let page: u32 = match caps[1].parse() {
                Ok(page) => page,
                Err(_) => continue,
            };
            if !known_pages.contains(&page) {
                return Err(EngineError::GroundingViolation(format!(
                    "cited page {page} not present in context"
                )));
            }
        }

        Ok(())
    }
}

/// Collapse whitespace so line wrapping does not defeat substring checks
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::assembler::ExcerptSection;
    use crate::query::Intent;

    fn bundle_with_excerpt(text: &str, page: u32) -> ContextBundle {
        ContextBundle {
            intent: Intent::PdfDetail,
            part_sections: Vec::new(),
            model_sections: Vec::new(),
            excerpt_sections: vec![ExcerptSection {
                url: "https://example.com/u.pdf".to_string(),
                page,
                excerpts: vec![text.to_string()],
            }],
            citable_urls: vec!["https://example.com/u.pdf".to_string()],
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_grounded_quote_passes() {
        let bundle =
            bundle_with_excerpt("Torque the mounting bolts to 12 Nm before sealing.", 4);
        let gate = GroundingGate::new().unwrap();

        let generated =
            "The manual says \"Torque the mounting bolts to 12 Nm\" on page 4.";
        assert!(gate.check(&bundle, generated).is_ok());
    }

    #[test]
    fn test_fabricated_quote_is_rejected() {
        let bundle = bundle_with_excerpt("Torque the mounting bolts to 12 Nm.", 4);
        let gate = GroundingGate::new().unwrap();

        let generated = "It states \"apply thread locker to every bolt before assembly\".";
        let err = gate.check(&bundle, generated).unwrap_err();
        assert!(matches!(err, EngineError::GroundingViolation(_)));
    }

    #[test]
    fn test_fabricated_page_citation_is_rejected() {
        let bundle = bundle_with_excerpt("Torque the mounting bolts to 12 Nm.", 4);
        let gate = GroundingGate::new().unwrap();

        let err = gate
            .check(&bundle, "See page 17 for details.")
            .unwrap_err();
        assert!(matches!(err, EngineError::GroundingViolation(_)));
    }

    #[test]
    fn test_short_quotes_are_not_checked() {
        let bundle = bundle_with_excerpt("Torque the mounting bolts to 12 Nm.", 4);
        let gate = GroundingGate::new().unwrap();

        // Four words, below the verification threshold.
        assert!(gate
            .check(&bundle, "The \"quick brown fox jumps\" aside.")
            .is_ok());
    }
}
