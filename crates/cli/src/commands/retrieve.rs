use mesa_core::config::LoadOptions;
use mesa_core::rag::embedder_from_config;
use mesa_core::{CorpusIndex, RetrievedChunk};
use serde::Serialize;

use crate::commands::{
    block_on, load_config, CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT, EXIT_RETRIEVAL,
};

const COMMAND: &str = "retrieve";

#[derive(Debug, Serialize)]
struct RetrievalReport<'a> {
    query: &'a str,
    top_k: usize,
    results: Vec<RetrievedChunk>,
}

pub fn run(options: &LoadOptions, query: &str, top_k: Option<usize>) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let embedder = match embedder_from_config(&config.embedding) {
        Ok(embedder) => embedder,
        Err(error) => {
            return CommandResult::failure(COMMAND, "embedding_setup", error.to_string(), EXIT_CONFIG)
        }
    };
    let corpus = CorpusIndex::new(&config.rag, embedder);
    let top_k = top_k.unwrap_or(config.rag.top_k);

    block_on(COMMAND, retrieve(&corpus, query, top_k)).unwrap_or_else(|failure| failure)
}

pub async fn retrieve(corpus: &CorpusIndex, query: &str, top_k: usize) -> CommandResult {
    if top_k == 0 {
        return CommandResult::failure(
            COMMAND,
            "invalid_argument",
            "--top-k must be greater than zero",
            EXIT_INVALID_INPUT,
        );
    }
    match corpus.retrieve(query, top_k).await {
        Ok(results) => CommandResult::json(COMMAND, &RetrievalReport { query, top_k, results }),
        Err(error) => CommandResult::failure(COMMAND, "retrieval", error.to_string(), EXIT_RETRIEVAL),
    }
}
