//! Extraction stage: ordered per-page plain text from PDF bytes

use lopdf::Document;

use crate::errors::{EngineError, Result};

/// Plain text of one document page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    /// Cleaned text; empty when the page had nothing extractable
    pub text: String,
}

/// Extract page texts in page order.
///
/// A page that yields no text (scanned image, empty page, or a per-page
/// decoding error) comes back with an empty string rather than failing the
/// document; only an unreadable document is an `ExtractionFailure`.
pub fn extract_page_texts(bytes: &[u8], url: &str) -> Result<Vec<PageText>> {
    let doc = Document::load_mem(bytes).map_err(|e| EngineError::ExtractionFailure {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let pages = doc.get_pages();
    let mut out = Vec::with_capacity(pages.len());

    for &page in pages.keys() {
        let raw = doc.extract_text(&[page]).unwrap_or_default();
        out.push(PageText {
            page,
            text: clean_text(&raw),
        });
    }

    Ok(out)
}

/// Collapse whitespace runs and strip control characters
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut last_was_space = true;

    for ch in text.chars() {
        if ch.is_control() && ch != ' ' {
            if !last_was_space {
                cleaned.push(' ');
                last_was_space = true;
            }
            continue;
        }
        if ch.is_whitespace() {
            if !last_was_space {
                cleaned.push(' ');
                last_was_space = true;
            }
        } else {
            cleaned.push(ch);
            last_was_space = false;
        }
    }

    cleaned.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("a  b\n\nc\td"), "a b c d");
        assert_eq!(clean_text("  leading and trailing  "), "leading and trailing");
    }

    #[test]
    fn test_clean_text_strips_control_chars() {
        assert_eq!(clean_text("ab\u{0000}cd"), "ab cd");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_unreadable_document_is_extraction_failure() {
        let err = extract_page_texts(b"not a pdf at all", "https://example.com/x.pdf")
            .unwrap_err();
        assert!(matches!(err, EngineError::ExtractionFailure { .. }));
    }
}
