use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::{build_single_turn_prompt, LlmClient};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CheckAvailability,
    CreateReservation,
    ViewNextReservation,
    /// Routed by the dispatcher but never produced by the classifier.
    ListReservations,
    CancelReservation,
    RestaurantFaq,
    Other,
}

impl Intent {
    /// Labels the classifier may answer with, in substring scan order.
    pub const CLASSIFIER_LABELS: [Intent; 6] = [
        Intent::CheckAvailability,
        Intent::CreateReservation,
        Intent::ViewNextReservation,
        Intent::CancelReservation,
        Intent::RestaurantFaq,
        Intent::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckAvailability => "check_availability",
            Self::CreateReservation => "create_reservation",
            Self::ViewNextReservation => "view_next_reservation",
            Self::ListReservations => "list_reservations",
            Self::CancelReservation => "cancel_reservation",
            Self::RestaurantFaq => "restaurant_faq",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "check_availability" => Ok(Self::CheckAvailability),
            "create_reservation" => Ok(Self::CreateReservation),
            "view_next_reservation" => Ok(Self::ViewNextReservation),
            "list_reservations" => Ok(Self::ListReservations),
            "cancel_reservation" => Ok(Self::CancelReservation),
            "restaurant_faq" => Ok(Self::RestaurantFaq),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown intent `{other}`")),
        }
    }
}

const LABEL_PREFIXES: [&str; 6] = ["intent:", "intenção:", "intencao:", "label:", "rótulo:", "rotulo:"];

pub const CLASSIFIER_PROMPT: &str = r#"
Você é um classificador de intenções para um assistente de restaurante integrado à plataforma GET IN.

Leia a mensagem do usuário (em português do Brasil) e decida QUAL é a intenção principal, pensando em
qual operação o sistema deve executar. Escolha EXATAMENTE UMA das intenções abaixo:

- check_availability -> o usuário quer saber se há mesa/disponibilidade para um dia, horário ou número de pessoas.
  Exemplos: "tem mesa pra 4 hoje às 20h?", "vocês têm disponibilidade amanhã no jantar?"
- create_reservation -> o usuário quer criar uma reserva nova.
  Exemplos: "quero reservar para sábado às 21h para 2 pessoas", "pode reservar uma mesa pra 6 amanhã no almoço?"
- view_next_reservation -> o usuário quer consultar a próxima reserva dele.
  Exemplos: "qual é minha próxima reserva?", "tenho alguma reserva para hoje?"
- cancel_reservation -> o usuário quer cancelar uma reserva existente.
  Exemplos: "quero cancelar minha reserva de hoje às 20h", "não vou mais, cancela minha reserva"
- restaurant_faq -> perguntas gerais sobre o restaurante (cardápio, horários, pets, estacionamento, endereço).
  Exemplos: "vocês têm opções veganas?", "qual o dress code?"
- other -> a mensagem não se encaixa claramente em nenhuma das anteriores ou está muito ambígua.

Regras:
- Responda SOMENTE com um destes rótulos: check_availability, create_reservation,
  view_next_reservation, cancel_reservation, restaurant_faq, other.
- Não explique sua resposta e não inclua nada além do rótulo.
"#;

/// Maps free-form classifier output onto a label; anything unrecognized is `Other`.
pub fn normalize_label(raw_output: &str) -> Intent {
    let mut text = raw_output.trim().to_lowercase();
    for prefix in LABEL_PREFIXES {
        if let Some(stripped) = text.strip_prefix(prefix) {
            text = stripped.trim().to_string();
        }
    }

    if let Some(exact) = Intent::CLASSIFIER_LABELS.iter().find(|intent| intent.as_str() == text) {
        return *exact;
    }
    Intent::CLASSIFIER_LABELS
        .iter()
        .find(|intent| text.contains(intent.as_str()))
        .copied()
        .unwrap_or(Intent::Other)
}

/// Never fails: an oracle error classifies as `Other`.
pub async fn classify_intent(llm: &dyn LlmClient, user_input: &str) -> Intent {
    let prompt = build_single_turn_prompt(CLASSIFIER_PROMPT, user_input);
    match llm.complete(&prompt).await {
        Ok(raw) => normalize_label(&raw),
        Err(error) => {
            warn!(
                event_name = "agent.intent.oracle_failed",
                error_class = error.kind(),
                error = %error,
                "intent classification fell back to other"
            );
            Intent::Other
        }
    }
}

/// A generic `Other` does not override a concrete intent from an earlier turn.
pub fn resolve_sticky(previous: Option<Intent>, classified: Intent) -> Intent {
    match previous {
        Some(previous) if previous != Intent::Other && classified == Intent::Other => previous,
        _ => classified,
    }
}
