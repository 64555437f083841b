//! Recursive separator text splitter.
//!
//! Splits document text into [`Chunk`]s of at most `max_chars` characters.
//! Separators are tried coarsest first (paragraph, line, sentence, word);
//! a finer separator is only used for a piece that is still too long. The
//! empty separator at the end of the default list hard-cuts at character
//! boundaries, so the bound holds for any input.
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text.
//! 2. Split on it, keeping the separator attached to the end of each piece.
//! 3. Pieces that fit are merged greedily into chunks of at most
//!    `max_chars`, carrying up to `overlap_chars` of trailing pieces into
//!    the next chunk.
//! 4. Pieces that do not fit are split again with the remaining, finer
//!    separators. With no finer separator left the piece is emitted whole.
//! 5. Chunks are trimmed; whitespace-only chunks are dropped.
//!
//! Lengths are counted in `char`s, never bytes.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::models::Document;
//! use rag_harness_core::split::TextSplitter;
//!
//! let splitter = TextSplitter::new(1000, 0).unwrap();
//! let docs = vec![Document::new("https://example.com", "Hello world.\n\nSecond paragraph.")];
//! let chunks = splitter.split_documents(&docs);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].source, "https://example.com");
//! ```

use std::collections::VecDeque;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Paragraph break, line break, sentence terminator, whitespace, hard cut.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ".", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    max_chars: usize,
    overlap_chars: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the [`DEFAULT_SEPARATORS`].
    ///
    /// # Errors
    ///
    /// `max_chars` must be > 0 and `overlap_chars` must be < `max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            bail!("max_chars must be > 0");
        }
        if overlap_chars >= max_chars {
            bail!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                overlap_chars,
                max_chars
            );
        }
        Ok(Self {
            max_chars,
            overlap_chars,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list. Omitting the empty separator disables
    /// hard cuts, so a token longer than `max_chars` is kept whole.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split every document, preserving input order and each document's
    /// source and title.
    ///
    /// Chunk indices restart at 0 for each document.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, text)| make_chunk(doc, i as i64, &text))
            })
            .collect()
    }

    /// Split raw text into trimmed pieces of at most `max_chars` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.max_chars {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }

        out
    }

    /// Greedily combine pieces that each fit into chunks of at most `max_chars`.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.max_chars && !window.is_empty() {
                if let Some(text) = join_trimmed(&window) {
                    merged.push(text);
                }
                // Keep at most `overlap_chars` of trailing pieces, and only
                // as much as still leaves room for the incoming piece.
                while total > self.overlap_chars || (total > 0 && total + len > self.max_chars) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(text) = join_trimmed(&window) {
            merged.push(text);
        }

        merged
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Create a single [`Chunk`] with a random UUID and SHA-256 content hash.
fn make_chunk(doc: &Document, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: doc.source.clone(),
        title: doc.title.clone(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_short_document_single_chunk() {
        let splitter = TextSplitter::new(1000, 0).unwrap();
        let docs = vec![Document::new("https://a.example", "Hello, world!")];
        let chunks = splitter.split_documents(&docs);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source, "https://a.example");
    }

    #[test]
    fn test_empty_and_blank_documents_yield_nothing() {
        let splitter = TextSplitter::new(100, 0).unwrap();
        let docs = vec![
            Document::new("https://a.example", ""),
            Document::new("https://b.example", "  \n\n \n "),
        ];
        assert!(splitter.split_documents(&docs).is_empty());
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(20, 0).unwrap();
        let chunks = splitter.split_text("Para one is here.\n\nPara two is here.");
        assert_eq!(chunks, vec!["Para one is here.", "Para two is here."]);
    }

    #[test]
    fn test_falls_back_to_sentences_within_long_paragraph() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let text = "Rates rose in May. Rates fell in June. Rates held in July.\n\nShort.";
        let chunks = splitter.split_text(text);
        assert!(chunks.len() >= 3);
        for c in &chunks {
            assert!(c.chars().count() <= 30, "chunk too long: {:?}", c);
        }
        assert_eq!(chunks.last().map(String::as_str), Some("Short."));
        assert!(chunks[0].starts_with("Rates rose in May."));
    }

    #[test]
    fn test_no_separator_is_hard_cut() {
        let splitter = TextSplitter::new(1000, 0).unwrap();
        let text = "a".repeat(2500);
        let chunks = splitter.split_text(&text);
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 500]);
    }

    #[test]
    fn test_chunk_bound_holds_for_long_text() {
        let splitter = TextSplitter::new(120, 0).unwrap();
        let text = (0..200)
            .map(|i| {
                if i % 7 == 0 {
                    format!("Sentence number {} ends a paragraph.\n\n", i)
                } else if i % 5 == 0 {
                    format!("Line {} stands alone\n", i)
                } else {
                    format!("Sentence number {} has a few words. ", i)
                }
            })
            .collect::<String>();
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 10);
        for c in &chunks {
            assert!(c.chars().count() <= 120);
            assert!(!c.trim().is_empty());
        }
    }

    #[test]
    fn test_no_content_dropped_without_overlap() {
        let splitter = TextSplitter::new(50, 0).unwrap();
        let text = "The 30-year fixed rate was 6.85% on Dec. 20, 2024.\n\nThe Fed cut its benchmark rate \
                    by a quarter point.\nMortgage rates rose anyway because bond yields climbed.";
        let chunks = splitter.split_text(text);
        assert_eq!(strip_ws(&chunks.concat()), strip_ws(text));
    }

    // A token longer than the limit cannot be split without the hard-cut
    // separator; it is emitted whole rather than dropped.
    #[test]
    fn test_unsplittable_token_exceeds_bound_without_hard_cut() {
        let splitter = TextSplitter::new(20, 0)
            .unwrap()
            .with_separators(["\n\n", "\n", ".", " "]);
        let long_token = "x".repeat(50);
        let text = format!("short words {} more words", long_token);
        let chunks = splitter.split_text(&text);
        assert!(chunks.contains(&long_token));
        for c in chunks.iter().filter(|c| **c != long_token) {
            assert!(c.chars().count() <= 20);
        }
    }

    #[test]
    fn test_overlap_carries_trailing_words() {
        let splitter = TextSplitter::new(15, 6).unwrap();
        let chunks = splitter.split_text("one two three four five six seven eight nine ten");
        assert_eq!(
            chunks,
            vec![
                "one two three",
                "three four",
                "four five six",
                "six seven",
                "seven eight",
                "eight nine ten",
            ]
        );
    }

    #[test]
    fn test_order_and_sources_preserved() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let docs = vec![
            Document::new("https://first.example", "alpha beta gamma delta"),
            Document::new("https://second.example", "epsilon zeta"),
        ];
        let chunks = splitter.split_documents(&docs);
        let first: Vec<&Chunk> = chunks
            .iter()
            .take_while(|c| c.source == "https://first.example")
            .collect();
        assert!(first.len() >= 2);
        assert!(chunks[first.len()..]
            .iter()
            .all(|c| c.source == "https://second.example"));
        for (i, c) in first.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
        assert_eq!(chunks[first.len()].chunk_index, 0);
    }

    #[test]
    fn test_chunks_inherit_document_title() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let mut titled = Document::new("https://a.example", "alpha beta gamma delta");
        titled.title = Some("Rates".to_string());
        let docs = vec![titled, Document::new("https://b.example", "epsilon")];
        let chunks = splitter.split_documents(&docs);
        for c in &chunks {
            let expected = (c.source == "https://a.example").then_some("Rates");
            assert_eq!(c.title.as_deref(), expected);
        }
    }

    #[test]
    fn test_multibyte_chars_counted_not_bytes() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let text = "é".repeat(30);
        let chunks = splitter.split_text(&text);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert_eq!(c.chars().count(), 10);
        }
    }

    #[test]
    fn test_ids_unique_hashes_deterministic() {
        let splitter = TextSplitter::new(5, 0).unwrap();
        let docs = vec![Document::new("s", "Alpha\n\nBeta\n\nGamma\n\nDelta")];
        let c1 = splitter.split_documents(&docs);
        let c2 = splitter.split_documents(&docs);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_ne!(a.id, b.id);
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(10, 9).is_ok());
    }
}
