//! The four-stage turn pipeline: classify, extract, dispatch, answer.
//!
//! Each stage takes the conversation state by value and hands it on. There is
//! exactly one path through the stages; branching happens only inside
//! dispatch (routing on intent) and answer (error vs. success prompt).

use std::sync::Arc;

use chrono::NaiveDate;
use mesa_booking::BookingApi;
use mesa_core::CorpusIndex;
use serde_json::Value;
use tracing::{debug, info};

use crate::actions::{
    answer_with_rag, cancel_reservation, check_availability, create_reservation,
    list_reservations, view_next_reservation, ActionContext, ActionResult, FaqLimits,
};
use crate::answer::synthesize_answer;
use crate::extractor::extract_params;
use crate::intent::{classify_intent, resolve_sticky, Intent};
use crate::llm::LlmClient;
use crate::state::AgentState;

/// One oracle handle per stage, each with its own sampling profile.
#[derive(Clone)]
pub struct StageModels {
    pub classifier: Arc<dyn LlmClient>,
    pub extractor: Arc<dyn LlmClient>,
    pub faq: Arc<dyn LlmClient>,
    pub answer: Arc<dyn LlmClient>,
}

impl StageModels {
    pub fn shared(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            classifier: Arc::clone(&llm),
            extractor: Arc::clone(&llm),
            faq: Arc::clone(&llm),
            answer: llm,
        }
    }
}

pub struct TurnWorkflow {
    models: StageModels,
    booking: Arc<dyn BookingApi>,
    corpus: Arc<CorpusIndex>,
    default_unit_id: Option<String>,
    faq_limits: FaqLimits,
}

impl TurnWorkflow {
    pub fn new(
        models: StageModels,
        booking: Arc<dyn BookingApi>,
        corpus: Arc<CorpusIndex>,
        default_unit_id: Option<String>,
        faq_limits: FaqLimits,
    ) -> Self {
        Self { models, booking, corpus, default_unit_id, faq_limits }
    }

    pub fn booking(&self) -> Arc<dyn BookingApi> {
        Arc::clone(&self.booking)
    }

    pub fn corpus(&self) -> &CorpusIndex {
        &self.corpus
    }

    pub async fn run(&self, state: AgentState, today: NaiveDate) -> AgentState {
        let state = self.classify(state).await;
        let state = self.extract(state, today).await;
        let state = self.dispatch(state).await;
        self.answer(state).await
    }

    pub async fn classify(&self, mut state: AgentState) -> AgentState {
        let previous = state.intent;
        let classified = classify_intent(self.models.classifier.as_ref(), &state.user_input).await;
        let intent = resolve_sticky(previous, classified);
        info!(
            event_name = "agent.turn.classified",
            classified = %classified,
            intent = %intent,
            sticky = intent != classified,
            "intent resolved"
        );
        state.intent = Some(intent);
        state
    }

    pub async fn extract(&self, mut state: AgentState, today: NaiveDate) -> AgentState {
        let extracted =
            extract_params(self.models.extractor.as_ref(), &state.user_input, state.intent, today)
                .await;
        debug!(
            event_name = "agent.turn.extracted",
            date = extracted.date.is_some(),
            time = extracted.time.is_some(),
            party_size = extracted.party_size.is_some(),
            contact = extracted.phone.is_some() || extracted.email.is_some(),
            "parameters extracted"
        );
        state.params.merge(extracted);
        state
    }

    pub async fn dispatch(&self, mut state: AgentState) -> AgentState {
        let context = ActionContext {
            booking: self.booking.as_ref(),
            default_unit_id: self.default_unit_id.as_deref(),
        };
        let params = &state.params;

        let result = match state.intent {
            Some(Intent::CheckAvailability) => check_availability(context, params).await,
            Some(Intent::CreateReservation) => create_reservation(context, params).await,
            Some(Intent::ViewNextReservation) => view_next_reservation(context, params).await,
            Some(Intent::ListReservations) => list_reservations(context, params).await,
            Some(Intent::CancelReservation) => cancel_reservation(context, params).await,
            Some(Intent::RestaurantFaq) => {
                let params = serde_json::to_value(params).unwrap_or(Value::Null);
                answer_with_rag(
                    self.models.faq.as_ref(),
                    &self.corpus,
                    &state.user_input,
                    params,
                    self.faq_limits,
                )
                .await
            }
            Some(Intent::Other) | None => {
                ActionResult::unknown_intent(serde_json::to_value(params).unwrap_or(Value::Null))
            }
        };

        let offered = result.available_sectors();
        if result.ok() && !offered.is_empty() {
            state.params.available_sectors = Some(offered.to_vec());
        }

        info!(
            event_name = "agent.turn.dispatched",
            action = ?result.kind,
            ok = result.ok(),
            error_code = ?result.error().map(|error| error.code),
            "action finished"
        );
        state.action_result = Some(result);
        state
    }

    pub async fn answer(&self, mut state: AgentState) -> AgentState {
        let result = state
            .action_result
            .get_or_insert_with(|| ActionResult::unknown_intent(Value::Null))
            .clone();
        let answer = synthesize_answer(
            self.models.answer.as_ref(),
            &state.user_input,
            state.intent,
            &state.params,
            &result,
        )
        .await;
        debug!(event_name = "agent.turn.answered", answer_len = answer.len(), "answer synthesized");
        state.answer = Some(answer);
        state
    }
}
