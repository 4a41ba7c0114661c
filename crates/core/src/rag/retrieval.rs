use std::sync::Arc;

use crate::rag::document::RetrievedChunk;
use crate::rag::embedding::EmbeddingProvider;
use crate::rag::store::VectorStore;
use crate::rag::{RagError, Result};

/// Embeds a query and searches the store with it.
#[derive(Clone)]
pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: VectorStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let query_vector = self.embedder.embed(query).await?;
        let results = self.store.search(&query_vector, top_k)?;
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("chunks", &self.store.len())
            .field("dimension", &self.store.dimension())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}
