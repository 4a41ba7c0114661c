use std::path::Path;

use serde::{Deserialize, Serialize};

/// One source file of the corpus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), source: source.into() }
    }

    pub fn from_path(path: &Path, text: String) -> Self {
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { id, text, source: path.display().to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub index: usize,
    pub text: String,
    pub source: String,
}

impl Chunk {
    pub fn chunk_id(doc_id: &str, index: usize) -> String {
        format!("{doc_id}::chunk-{index}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// A search hit flattened for prompt building and display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
    pub chunk_id: String,
    pub doc_id: String,
    pub index: usize,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        let SearchResult { chunk, score } = result;
        Self {
            text: chunk.text,
            source: chunk.source,
            score,
            chunk_id: chunk.id,
            doc_id: chunk.doc_id,
            index: chunk.index,
        }
    }
}
