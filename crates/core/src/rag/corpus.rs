//! Corpus loading and the once-per-process retriever cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::rag::chunking::{ChunkingConfig, TextChunker};
use crate::rag::document::{Document, RetrievedChunk};
use crate::rag::embedding::EmbeddingProvider;
use crate::rag::retrieval::Retriever;
use crate::rag::store::VectorStore;
use crate::rag::{RagError, Result};

const CORPUS_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Loads every `.md`/`.txt` file under `dir` (not recursive), sorted by path.
/// Files that are blank after trimming are skipped.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let corpus_error = |source| RagError::Corpus { path: dir.to_path_buf(), source };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(corpus_error)?;
    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(corpus_error)? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| CORPUS_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| RagError::Corpus { path: path.clone(), source })?;
        let text = text.trim();
        if text.is_empty() {
            debug!(event_name = "rag.corpus.skip_empty", path = %path.display(), "skipping blank document");
            continue;
        }
        documents.push(Document::from_path(&path, text.to_string()));
    }

    Ok(documents)
}

/// Load, chunk, embed in one batch, and index the corpus.
pub async fn build_retriever(
    corpus_dir: &Path,
    chunking: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Retriever> {
    let chunker = TextChunker::new(chunking)?;
    let documents = load_documents(corpus_dir).await?;
    let chunks = chunker.chunk_documents(&documents);
    if chunks.is_empty() {
        return Err(RagError::EmptyCorpus);
    }

    let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    if vectors.len() != chunks.len() {
        return Err(RagError::embedding(
            embedder.name(),
            format!("expected {} vectors, received {}", chunks.len(), vectors.len()),
        ));
    }

    let store = VectorStore::new(chunks, vectors)?;
    info!(
        event_name = "rag.corpus.built",
        corpus_dir = %corpus_dir.display(),
        documents = documents.len(),
        chunks = store.len(),
        dimension = store.dimension(),
        embedder = embedder.name(),
        "corpus index built"
    );

    Ok(Retriever::new(store, embedder))
}

/// Owned handle to the corpus retriever, built on first use.
///
/// Concurrent first callers wait on a single build; a failed build is not
/// cached, so the next call retries.
pub struct CorpusIndex {
    corpus_dir: PathBuf,
    chunking: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: OnceCell<Arc<Retriever>>,
}

impl CorpusIndex {
    pub fn new(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            corpus_dir: config.corpus_dir.clone(),
            chunking: ChunkingConfig::from(config),
            embedder,
            retriever: OnceCell::new(),
        }
    }

    pub fn prebuilt(retriever: Retriever, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            corpus_dir: PathBuf::new(),
            chunking: ChunkingConfig::default(),
            embedder,
            retriever: OnceCell::new_with(Some(Arc::new(retriever))),
        }
    }

    pub fn is_built(&self) -> bool {
        self.retriever.initialized()
    }

    pub async fn retriever(&self) -> Result<Arc<Retriever>> {
        self.retriever
            .get_or_try_init(|| async {
                build_retriever(&self.corpus_dir, self.chunking, Arc::clone(&self.embedder))
                    .await
                    .map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.retriever().await?.retrieve(query, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::{build_retriever, load_documents, CorpusIndex};
    use crate::config::RagConfig;
    use crate::rag::chunking::ChunkingConfig;
    use crate::rag::embedding::HashingEmbedder;
    use crate::rag::RagError;

    fn corpus() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("b_reservas.md"), "Reservas podem ser feitas até 2 horas antes.")
            .expect("write");
        fs::write(dir.path().join("a_horarios.txt"), "Abrimos às 12h e fechamos às 23h.")
            .expect("write");
        fs::write(dir.path().join("vazio.md"), "   \n").expect("write");
        fs::write(dir.path().join("logo.png"), [0_u8, 1, 2]).expect("write");
        dir
    }

    fn rag_config(dir: &TempDir) -> RagConfig {
        RagConfig {
            corpus_dir: dir.path().to_path_buf(),
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 3,
            max_context_chunks: 1,
        }
    }

    #[tokio::test]
    async fn loads_text_documents_sorted_and_skips_blank_files() {
        let dir = corpus();
        let documents = load_documents(dir.path()).await.expect("documents");
        let ids: Vec<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();

        assert_eq!(ids, vec!["a_horarios", "b_reservas"]);
        assert!(documents[0].source.ends_with("a_horarios.txt"));
    }

    #[tokio::test]
    async fn missing_directory_is_a_corpus_error() {
        let dir = TempDir::new().expect("tempdir");
        let result = load_documents(&dir.path().join("nope")).await;
        assert!(matches!(result, Err(RagError::Corpus { .. })));
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_corpus() {
        let dir = TempDir::new().expect("tempdir");
        let embedder = Arc::new(HashingEmbedder::new(32).expect("dimensions"));
        let result = build_retriever(dir.path(), ChunkingConfig::default(), embedder).await;
        assert!(matches!(result, Err(RagError::EmptyCorpus)));
    }

    #[tokio::test]
    async fn index_builds_once_and_answers_queries() {
        let dir = corpus();
        let index =
            CorpusIndex::new(&rag_config(&dir), Arc::new(HashingEmbedder::new(1024).expect("dims")));
        assert!(!index.is_built());

        let first = index.retriever().await.expect("retriever");
        let second = index.retriever().await.expect("retriever");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.store().len(), 2);

        let results = index.retrieve("abrimos às 12h mesmo?", 1).await.expect("results");
        assert_eq!(results[0].doc_id, "a_horarios");
    }

    #[tokio::test]
    async fn failed_build_is_retried_on_next_use() {
        let dir = TempDir::new().expect("tempdir");
        let index =
            CorpusIndex::new(&rag_config(&dir), Arc::new(HashingEmbedder::new(64).expect("dims")));

        assert!(matches!(index.retriever().await, Err(RagError::EmptyCorpus)));
        fs::write(dir.path().join("faq.md"), "Temos opções sem glúten.").expect("write");
        assert!(index.retriever().await.is_ok());
    }
}
