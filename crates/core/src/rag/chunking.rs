//! Fixed-size character windows with overlap.

use crate::config::RagConfig;
use crate::rag::document::{Chunk, Document};
use crate::rag::{RagError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { size: 500, overlap: 100 }
    }
}

impl From<&RagConfig> for ChunkingConfig {
    fn from(config: &RagConfig) -> Self {
        Self { size: config.chunk_size, overlap: config.chunk_overlap }
    }
}

/// Splits text into windows of `size` characters; consecutive windows share
/// `overlap` characters. Sizes count Unicode scalar values, not bytes.
#[derive(Clone, Debug)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.size == 0 {
            return Err(RagError::InvalidConfiguration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if config.overlap >= config.size {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.overlap, config.size
            )));
        }
        Ok(Self { size: config.size, overlap: config.overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Windows whose text is blank after trimming are dropped.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut pieces = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.size).min(char_count);
            let piece = text[boundaries[start]..boundaries[end]].trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            if end == char_count {
                break;
            }
            start = end - self.overlap;
        }
        pieces
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: Chunk::chunk_id(&document.id, index),
                doc_id: document.id.clone(),
                index,
                text,
                source: document.source.clone(),
            })
            .collect()
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk_document(document)).collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{ChunkingConfig, TextChunker};
    use crate::rag::document::Document;
    use crate::rag::RagError;

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(ChunkingConfig { size, overlap }).expect("valid chunking config")
    }

    #[test]
    fn rejects_zero_size_and_oversized_overlap() {
        for (size, overlap) in [(0, 0), (10, 10), (10, 11)] {
            let result = TextChunker::new(ChunkingConfig { size, overlap });
            assert!(
                matches!(result, Err(RagError::InvalidConfiguration(_))),
                "size={size} overlap={overlap} should be rejected"
            );
        }
    }

    #[test]
    fn blank_text_yields_no_chunks() {
        let chunker = chunker(10, 2);
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("   \n\t ").is_empty());
    }

    #[test]
    fn windows_step_by_size_minus_overlap() {
        let pieces = chunker(4, 1).split_text("abcdefghij");
        assert_eq!(pieces, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn short_text_fits_in_one_window() {
        let pieces = chunker(500, 100).split_text("  Horário: 12h às 23h  ");
        assert_eq!(pieces, vec!["Horário: 12h às 23h"]);
    }

    #[test]
    fn whitespace_only_windows_are_dropped_and_indices_stay_dense() {
        let document = Document::new("faq", format!("abc{}xyz", " ".repeat(8)), "docs/faq.md");
        let chunks = chunker(3, 0).chunk_document(&document);
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();

        assert_eq!(texts, vec!["abc", "x", "yz"]);
        let indices: Vec<usize> = chunks.iter().map(|chunk| chunk.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn multibyte_text_is_split_on_character_boundaries() {
        let pieces = chunker(3, 1).split_text("açaí café");
        assert_eq!(pieces, vec!["aça", "aí", "ca", "afé"]);
    }

    #[test]
    fn chunk_ids_combine_document_id_and_index() {
        let document = Document::new("cardapio", "a".repeat(12), "docs/cardapio.md");
        let chunks = chunker(5, 1).chunk_document(&document);

        assert_eq!(chunks[0].id, "cardapio::chunk-0");
        assert_eq!(chunks[2].id, "cardapio::chunk-2");
        assert!(chunks.iter().all(|chunk| chunk.doc_id == "cardapio"));
        assert!(chunks.iter().all(|chunk| chunk.source == "docs/cardapio.md"));
    }

    proptest! {
        #[test]
        fn chunk_count_and_spans_follow_the_window_step(
            text in "[a-zA-Z0-9çãé]{0,300}",
            size in 1usize..40,
            overlap_seed in 0usize..40,
        ) {
            let overlap = overlap_seed % size;
            let pieces = chunker(size, overlap).split_text(&text);
            let chars: Vec<char> = text.chars().collect();
            let len = chars.len();
            let step = size - overlap;

            let expected = if len == 0 { 0 } else { len.saturating_sub(overlap).div_ceil(step).max(1) };
            prop_assert_eq!(pieces.len(), expected);

            for (index, piece) in pieces.iter().enumerate() {
                let start = index * step;
                let end = (start + size).min(len);
                let window: String = chars[start..end].iter().collect();
                prop_assert_eq!(piece, &window);
            }
            if let Some(last) = pieces.last() {
                prop_assert!(text.ends_with(last.as_str()));
            }
        }
    }
}
