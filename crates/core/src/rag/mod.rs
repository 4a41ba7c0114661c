//! In-memory semantic retrieval over the restaurant's documentation.
//!
//! The pipeline is deliberately small: documents are split into overlapping
//! character windows ([`chunking`]), embedded through an [`EmbeddingProvider`],
//! and held in a read-only [`VectorStore`] searched by cosine similarity.
//! [`CorpusIndex`] builds the whole thing once, on first use.

pub mod chunking;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod retrieval;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use chunking::{ChunkingConfig, TextChunker};
pub use corpus::{build_retriever, load_documents, CorpusIndex};
pub use document::{Chunk, Document, RetrievedChunk, SearchResult};
pub use embedding::{embedder_from_config, EmbeddingProvider, HashingEmbedder, OpenAiEmbedder};
pub use retrieval::Retriever;
pub use store::{cosine_similarity, VectorStore};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("corpus is empty: no chunks to index")]
    EmptyCorpus,
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },
    #[error("could not read corpus at `{path}`: {source}")]
    Corpus { path: PathBuf, source: std::io::Error },
}

impl RagError {
    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.to_string(), message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
