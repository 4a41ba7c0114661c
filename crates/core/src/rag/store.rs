use std::cmp::Ordering;

use crate::rag::document::{Chunk, SearchResult};
use crate::rag::{RagError, Result};

/// Cosine similarity, defined as `0.0` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Read-only store of chunks and their vectors, position for position.
///
/// The dimension is fixed by the first vector at construction; every stored
/// vector and every query must match it.
#[derive(Clone, Debug)]
pub struct VectorStore {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorStore {
    pub fn new(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() || vectors.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        if chunks.len() != vectors.len() {
            return Err(RagError::InvalidConfiguration(format!(
                "{} chunks were paired with {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors[0].len();
        if let Some(mismatched) = vectors.iter().find(|vector| vector.len() != dimension) {
            return Err(RagError::DimensionMismatch { expected: dimension, actual: mismatched.len() });
        }

        Ok(Self { chunks, vectors, dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Scores every entry and returns the best `top_k`, highest first. Equal
    /// scores keep storage order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, cosine_similarity(query, vector)))
            .collect();
        // sort_by is stable, so ties stay in storage order.
        scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult { chunk: self.chunks[position].clone(), score })
            .collect())
    }
}
