use mesa_core::config::RagConfig;
use mesa_core::{CorpusIndex, RetrievedChunk};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{ActionDetail, ActionError, ActionKind, ActionOutcome, ActionResult, ErrorCode, FaqMeta};
use crate::llm::LlmClient;

const RETRIEVAL_ERROR_MESSAGE: &str =
    "Não consegui acessar a documentação interna para responder sua pergunta.";
const GENERATION_ERROR_MESSAGE: &str =
    "Ocorreu um erro ao gerar a resposta baseada na documentação interna.";
const NO_CONTEXT_ANSWER: &str =
    "Não encontrei informações suficientes na documentação para responder. Recomendo consultar um atendente.";
const EMPTY_CONTEXT: &str = "Nenhum contexto disponível.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaqLimits {
    pub top_k: usize,
    pub max_context_chunks: usize,
}

impl From<&RagConfig> for FaqLimits {
    fn from(config: &RagConfig) -> Self {
        Self { top_k: config.top_k, max_context_chunks: config.max_context_chunks }
    }
}

pub fn build_faq_prompt(query: &str, chunks: &[RetrievedChunk], max_context_chunks: usize) -> String {
    let context = chunks
        .iter()
        .take(max_context_chunks)
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let context = if context.trim().is_empty() { EMPTY_CONTEXT } else { context.as_str() };

    format!(
        "Você é um assistente virtual de um restaurante.\n\
         Responda APENAS com base na documentação abaixo.\n\
         Se a informação não estiver presente, diga que não está disponível.\n\
         Responda em português do Brasil, de forma direta e curta.\n\n\
         Documentação:\n{context}\n\n\
         Pergunta:\n{query}\n\n\
         Resposta:"
    )
}

/// Answers a restaurant question from the documentation corpus.
///
/// An empty retrieval is still a successful lookup: the guest is told the
/// documentation does not cover the question.
pub async fn answer_with_rag(
    llm: &dyn LlmClient,
    corpus: &CorpusIndex,
    user_input: &str,
    params: Value,
    limits: FaqLimits,
) -> ActionResult {
    let request = json!({ "user_input": user_input, "params": params });

    let chunks = match corpus.retrieve(user_input, limits.top_k).await {
        Ok(chunks) => chunks,
        Err(error) => {
            warn!(event_name = "agent.faq.retrieval_failed", error = %error, "corpus retrieval failed");
            return ActionResult::failure(
                ActionKind::RestaurantFaq,
                request,
                ActionError::unexpected(RETRIEVAL_ERROR_MESSAGE, "RagError", &error.to_string())
                    .with_code(ErrorCode::RagRetrievalError),
            );
        }
    };

    if chunks.is_empty() {
        return faq_success(request, NO_CONTEXT_ANSWER.to_string(), 0);
    }

    let prompt = build_faq_prompt(user_input, &chunks, limits.max_context_chunks);
    match llm.complete(&prompt).await {
        Ok(answer) => {
            info!(event_name = "agent.faq.answered", chunks = chunks.len(), "faq answered from corpus");
            faq_success(request, answer.trim().to_string(), chunks.len())
        }
        Err(error) => {
            warn!(event_name = "agent.faq.generation_failed", error = %error, "faq generation failed");
            ActionResult::failure(
                ActionKind::RestaurantFaq,
                request,
                ActionError::unexpected(GENERATION_ERROR_MESSAGE, error.kind(), &error.to_string())
                    .with_code(ErrorCode::RagGenerationError),
            )
        }
    }
}

fn faq_success(request: Value, answer: String, chunks_count: usize) -> ActionResult {
    ActionResult {
        kind: ActionKind::RestaurantFaq,
        request,
        outcome: ActionOutcome::Success {
            response: None,
            detail: ActionDetail::Faq { answer, meta: FaqMeta { used_rag: true, chunks_count } },
        },
    }
}
