//! Fixed-size, overlapping character windows.
//!
//! Lengths are counted in Unicode scalar values, so a chunk never splits a
//! multi-byte character. When a window would end mid-text, the cut moves
//! back to the nearest whitespace within a short look-back so words stay
//! whole; the next window always starts exactly `chunk_overlap` characters
//! before the previous cut.

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { size: config.chunk_size, overlap: config.chunk_overlap })
    }

    /// Chunk every document in order. No chunk spans two documents.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.split(d)).collect()
    }

    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.windows(&document.text)
            .into_iter()
            .enumerate()
            .map(|(sequence_position, text)| Chunk { text, source_id: document.source_id.clone(), sequence_position })
            .collect()
    }

    fn windows(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let look_back = (self.size / 10).min(self.size - self.overlap - 1);

        let mut out = Vec::new();
        let mut start = 0;
        loop {
            let mut end = (start + self.size).min(len);
            if end < len {
                if let Some(ws) = (end - look_back..end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws + 1;
                }
            }
            let window: String = chars[start..end].iter().collect();
            if !window.trim().is_empty() {
                out.push(window);
            }
            if end >= len {
                break;
            }
            start = end - self.overlap;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(&ChunkingConfig { chunk_size: size, chunk_overlap: overlap }).unwrap()
    }

    fn doc(text: &str) -> Document {
        Document { source_id: "docs/a.txt".into(), kind: crate::types::DocumentKind::Text, text: text.into() }
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = chunker(1000, 200).split(&doc("The capital of France is Paris."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The capital of France is Paris.");
        assert_eq!(chunks[0].sequence_position, 0);
    }

    #[test]
    fn blank_document_has_no_chunks() {
        assert!(chunker(1000, 200).split(&doc(" \n\t ")).is_empty());
        assert!(chunker(1000, 200).split(&doc("")).is_empty());
    }

    #[test]
    fn cut_snaps_back_to_whitespace() {
        let c = chunker(20, 5);
        let text = "aaaaaaaaaaaaaaaaaa bbbbbbbbbb";
        let chunks = c.split(&doc(text));
        assert_eq!(chunks[0].text, "aaaaaaaaaaaaaaaaaa ");
    }

    #[test]
    fn multibyte_text_is_never_split_inside_a_char() {
        let text = "é".repeat(2500);
        let chunks = chunker(1000, 200).split(&doc(&text));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 1000));
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        assert!(Chunker::new(&ChunkingConfig { chunk_size: 100, chunk_overlap: 100 }).is_err());
        assert!(Chunker::new(&ChunkingConfig { chunk_size: 0, chunk_overlap: 0 }).is_err());
    }
}
