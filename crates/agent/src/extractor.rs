//! Structured parameters from a free-form guest message.
//!
//! The oracle is asked for a JSON object but its output is never trusted:
//! the whole reply is parsed first, then the outermost `{...}` span, and if
//! both fail the extraction is simply empty.

use chrono::NaiveDate;
use mesa_core::normalize::{combine_to_iso, normalize_date_on, normalize_time};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::intent::Intent;
use crate::llm::{build_single_turn_prompt, LlmClient};
use crate::state::Params;

pub const EXTRACTOR_PROMPT: &str = r#"
Você é responsável por extrair parâmetros estruturados a partir de uma mensagem de usuário
para um assistente de restaurante.

A mensagem sempre estará em português do Brasil.

Você deve analisar o texto e retornar um JSON com os seguintes campos:

{
  "date": string ou null,          // data mencionada (ex: "hoje", "amanhã", "2024-03-10")
  "time": string ou null,          // horário mencionado (ex: "20h", "19:30", "no almoço")
  "party_size": número ou null,    // quantidade de pessoas (ex: 2, 4, 10)
  "name": string ou null,          // nome da pessoa, se mencionado
  "phone": string ou null,         // telefone ou celular, se mencionado
  "email": string ou null,         // e-mail, se mencionado
  "notes": string ou null          // qualquer informação adicional relevante (ex: "mesa na janela", "aniversário")
}

Regras importantes:
- Se um campo não estiver claro na mensagem, use null.
- Não invente dados; apenas preencha o que estiver explícito ou muito óbvio.
- O JSON deve ser VÁLIDO, sem comentários, sem vírgulas sobrando.
- NÃO escreva nada antes ou depois do JSON.
Apenas retorne o JSON.
"#;

pub fn build_extractor_prompt(user_input: &str, intent: Option<Intent>) -> String {
    let system = match intent {
        Some(intent) => format!(
            "{}\n\nAtenção: a intenção detectada para esta mensagem é: \"{intent}\".\n\
             Priorize a extração de parâmetros relevantes para essa intenção.",
            EXTRACTOR_PROMPT.trim()
        ),
        None => EXTRACTOR_PROMPT.trim().to_string(),
    };
    build_single_turn_prompt(&system, user_input)
}

/// Whole-text parse, then the outermost brace span. Only objects count.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(Value::Object(object)) = serde_json::from_str(text) {
        return Some(object);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn party_size_field(object: &Map<String, Value>) -> Option<i64> {
    match object.get("party_size")? {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|n| n.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a parsed object into `Params`, keeping the object itself in `raw`.
///
/// Dates and times are normalized best-effort against `today`; when both
/// normalize, `datetime_iso` is attached.
pub fn params_from_object(object: Map<String, Value>, today: NaiveDate) -> Params {
    let mut params = Params {
        date: string_field(&object, "date"),
        time: string_field(&object, "time"),
        party_size: party_size_field(&object),
        name: string_field(&object, "name"),
        phone: string_field(&object, "phone"),
        email: string_field(&object, "email"),
        notes: string_field(&object, "notes"),
        ..Params::default()
    };

    let date_normalized = match params.date.as_deref().map(|text| normalize_date_on(text, today)) {
        Some(Ok(date)) => {
            params.date = Some(date);
            true
        }
        _ => false,
    };
    let time_normalized = match params.time.as_deref().map(normalize_time) {
        Some(Ok(time)) => {
            params.time = Some(time);
            true
        }
        _ => false,
    };
    if date_normalized && time_normalized {
        if let (Some(date), Some(time)) = (&params.date, &params.time) {
            params.datetime_iso = combine_to_iso(date, time).ok();
        }
    }

    params.raw = vec![Value::Object(object)];
    params
}

/// Asks the oracle for the message's parameters. Never fails.
pub async fn extract_params(
    llm: &dyn LlmClient,
    user_input: &str,
    intent: Option<Intent>,
    today: NaiveDate,
) -> Params {
    let prompt = build_extractor_prompt(user_input, intent);
    let reply = match llm.complete(&prompt).await {
        Ok(reply) => reply,
        Err(error) => {
            warn!(
                event_name = "agent.extract.oracle_failed",
                error_class = error.kind(),
                error = %error,
                "parameter extraction returned nothing"
            );
            String::new()
        }
    };

    let object = parse_json_object(&reply);
    if object.is_none() {
        debug!(event_name = "agent.extract.unparsed", reply_len = reply.len(), "extractor reply was not JSON");
    }
    params_from_object(object.unwrap_or_default(), today)
}
