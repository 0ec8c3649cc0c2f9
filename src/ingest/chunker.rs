//! Chunking stage: sentence-aware token windows with overlap
//!
//! Pages are split into chunks of a target token window with a fixed-size
//! overlap carried between consecutive chunks of the same page. Sentences
//! are never split: a sentence that straddles a boundary is duplicated into
//! the following chunk instead. The final chunk of a page may be shorter
//! than the window.

/// A chunk of page text, positioned by page and in-page index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub page: u32,
    pub chunk_index: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Chunk one page's text; empty text yields no chunks
    pub fn chunk_page(&self, page: u32, text: &str) -> Vec<TextChunk> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let sentence_tokens = estimate_tokens(&sentence);

            if current_tokens + sentence_tokens > self.chunk_size && !current.is_empty() {
                chunks.push(TextChunk {
                    page,
                    chunk_index: chunks.len() as u32,
                    text: current.join(" "),
                });

                // Carry the tail sentences forward as overlap.
                let (overlap, overlap_tokens) = self.overlap_tail(&current);
                current = overlap;
                current_tokens = overlap_tokens;
            }

            current_tokens += sentence_tokens;
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(TextChunk {
                page,
                chunk_index: chunks.len() as u32,
                text: current.join(" "),
            });
        }

        chunks
    }

    /// Longest suffix of `sentences` fitting the overlap budget
    fn overlap_tail(&self, sentences: &[String]) -> (Vec<String>, usize) {
        if self.chunk_overlap == 0 {
            return (Vec::new(), 0);
        }

        let mut tail = Vec::new();
        let mut tokens = 0;

        for sentence in sentences.iter().rev() {
            let sentence_tokens = estimate_tokens(sentence);
            if tokens + sentence_tokens > self.chunk_overlap {
                break;
            }
            tail.insert(0, sentence.clone());
            tokens += sentence_tokens;
        }

        (tail, tokens)
    }
}

/// Split text after sentence-ending punctuation followed by whitespace
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminator = false;

    for (i, ch) in text.char_indices() {
        match ch {
            '.' | '!' | '?' => after_terminator = true,
            c if c.is_whitespace() => {
                if after_terminator {
                    let sentence = text[start..i].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    start = i;
                    after_terminator = false;
                }
            }
            _ => after_terminator = false,
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Rough token estimate: word count scaled by 1.3
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count() * 13 / 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_split_sentences_basic() {
        let sentences = split_sentences("First one. Second one! Third one? Tail without stop");
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "First one.");
        assert_eq!(sentences[3], "Tail without stop");
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_empty_page_yields_no_chunks() {
        let chunker = Chunker::new(800, 100);
        assert!(chunker.chunk_page(1, "").is_empty());
    }

    #[test]
    fn test_short_page_yields_single_chunk() {
        let chunker = Chunker::new(800, 100);
        let chunks = chunker.chunk_page(2, "Remove the access panel. Disconnect power.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 2);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let chunker = Chunker::new(20, 5);
        let text = (0..30)
            .map(|i| format!("Sentence number {i} has exactly seven words total."))
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = chunker.chunk_page(1, &text);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let chunker = Chunker::new(20, 10);
        let text = (0..20)
            .map(|i| format!("Overlap test sentence number {i} right here."))
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = chunker.chunk_page(1, &text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // The next chunk starts with the tail of the previous one.
            let first_sentence = split_sentences(&pair[1].text)
                .into_iter()
                .next()
                .unwrap();
            assert!(
                pair[0].text.contains(&first_sentence),
                "chunk {} does not overlap its predecessor",
                pair[1].chunk_index
            );
        }
    }

    #[quickcheck]
    fn prop_no_sentence_is_lost(words_per_sentence: u8, sentence_count: u8) -> bool {
        let words = (words_per_sentence % 12) as usize + 1;
        let count = (sentence_count % 40) as usize + 1;

        let text = (0..count)
            .map(|i| {
                let body = vec![format!("word{i}"); words].join(" ");
                format!("{body}.")
            })
            .collect::<Vec<_>>()
            .join(" ");

        let chunker = Chunker::new(25, 8);
        let chunks = chunker.chunk_page(1, &text);
        let combined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        split_sentences(&text)
            .iter()
            .all(|sentence| combined.contains(sentence.as_str()))
    }
}
