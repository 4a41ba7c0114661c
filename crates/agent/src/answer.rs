//! Final reply synthesis from the dispatched action's result.

use serde_json::Value;
use tracing::warn;

use crate::actions::{ActionKind, ActionResult};
use crate::intent::Intent;
use crate::llm::LlmClient;
use crate::state::Params;

pub const FALLBACK_ANSWER: &str =
    "Não consegui gerar uma resposta adequada no momento. Por favor, tente novamente em instantes.";
pub const UNCLEAR_FAQ_ANSWER: &str =
    "Consegui consultar a documentação interna, mas não obtive uma resposta clara.";

fn intent_label(intent: Option<Intent>) -> &'static str {
    intent.map(Intent::as_str).unwrap_or_default()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn build_error_prompt(user_input: &str, intent: Option<Intent>, result: &ActionResult) -> String {
    format!(
        "Você é um assistente virtual de um restaurante, respondendo em português do Brasil.\n\
         Você recebeu o resultado de uma ação interna (API GET IN ou RAG) que contém um erro.\n\
         Sua tarefa é explicar educadamente ao usuário o que aconteceu, em poucas frases, \
         e orientar o próximo passo quando possível.\n\n\
         Interpretação importante de erros da API GET IN:\n\
         - Quando o erro mencionar mensagens como:\n  \
         'Não é possível realizar 2 reservas para o mesmo dia/horário utilizando este celular ou e-mail',\n  \
         isso indica uma REGRA DE NEGÓCIO de duplicidade de contato.\n\
         - Esse erro NÃO significa falta de disponibilidade nem que o horário esteja ocupado.\n\
         - Significa apenas que o mesmo telefone ou e-mail não pode ser usado para mais de uma reserva no mesmo horário.\n\n\
         - Nunca afirme que já existe uma reserva naquele horário a menos que isso tenha sido retornado explicitamente \
         por uma consulta de reservas.\n\n\
         Pergunta do usuário:\n{user_input}\n\n\
         Intent reconhecida: {intent}\n\n\
         Resultado da ação (JSON simplificado):\n{result}\n\n\
         Agora responda apenas a mensagem final em PT-BR para o usuário, \
         sem mencionar JSON, APIs ou detalhes técnicos internos.",
        intent = intent_label(intent),
        result = pretty(&result.to_json()),
    )
}

pub fn build_success_prompt(
    user_input: &str,
    intent: Option<Intent>,
    params: &Params,
    result: &ActionResult,
) -> String {
    let params = serde_json::to_value(params).unwrap_or(Value::Null);
    format!(
        "Você é um assistente virtual de um restaurante, respondendo em português do Brasil.\n\
         Você recebeu o resultado de uma ação interna em formato JSON.\n\n\
         Regras específicas importantes:\n\
         - NUNCA diga que a reserva está 'confirmada' se o JSON indicar status 'pending'.\n\
         - Se status='pending', diga que a reserva foi criada e está pendente de confirmação.\n\
         - Se status='confirmed', diga que está confirmada.\n\
         - Se existir 'id' em response.data.id, inclua como 'código da reserva'.\n\
         - Se existir 'sector.name', use o nome do setor.\n\
         - Se existir 'available_sectors', liste os nomes dos setores e peça para o usuário escolher um deles.\n\
         - Se confirmation_sent=false, não diga que o e-mail já foi enviado; diga que poderá receber a confirmação.\n\n\
         Pergunta do usuário:\n{user_input}\n\n\
         Intent reconhecida: {intent}\n\n\
         Parâmetros extraídos: {params}\n\n\
         Resultado da ação (JSON simplificado):\n{result}\n\n\
         Agora responda apenas a mensagem final em PT-BR.",
        intent = intent_label(intent),
        params = params,
        result = pretty(&result.to_json()),
    )
}

/// Turns an action result into the guest-facing reply. Never fails.
///
/// A successful FAQ lookup already carries its answer and skips the oracle.
pub async fn synthesize_answer(
    llm: &dyn LlmClient,
    user_input: &str,
    intent: Option<Intent>,
    params: &Params,
    result: &ActionResult,
) -> String {
    if result.kind == ActionKind::RestaurantFaq && result.ok() {
        let answer = result.faq_answer().map(str::trim).unwrap_or_default();
        return if answer.is_empty() { UNCLEAR_FAQ_ANSWER.to_string() } else { answer.to_string() };
    }

    let prompt = if result.error().is_some() {
        build_error_prompt(user_input, intent, result)
    } else {
        build_success_prompt(user_input, intent, params, result)
    };

    match llm.complete(&prompt).await {
        Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
        Ok(_) => FALLBACK_ANSWER.to_string(),
        Err(error) => {
            warn!(
                event_name = "agent.answer.oracle_failed",
                error_class = error.kind(),
                error = %error,
                "answer synthesis fell back to apology"
            );
            FALLBACK_ANSWER.to_string()
        }
    }
}
