use std::sync::Arc;

use chrono::{Local, NaiveDate};
use mesa_booking::{BookingApi, BookingError, GetInClient};
use mesa_core::rag::embedder_from_config;
use mesa_core::{AppConfig, CorpusIndex, RagError};
use thiserror::Error;
use tracing::{info, Instrument};

use crate::actions::FaqLimits;
use crate::llm::{HttpLlmClient, OracleError, Sampling};
use crate::state::AgentState;
use crate::workflow::{StageModels, TurnWorkflow};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("oracle setup failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("booking client setup failed: {0}")]
    Booking(#[from] BookingError),
    #[error("embedding setup failed: {0}")]
    Embedding(#[from] RagError),
}

/// Composition root: owns the shared clients and the corpus index, and runs
/// one turn at a time for any number of independent conversations.
pub struct AgentRuntime {
    workflow: TurnWorkflow,
    today: Option<NaiveDate>,
}

impl AgentRuntime {
    pub fn new(workflow: TurnWorkflow) -> Self {
        Self { workflow, today: None }
    }

    /// Pins the reference date relative expressions resolve against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        let llm = HttpLlmClient::from_config(&config.llm)?;
        let models = StageModels {
            classifier: Arc::new(llm.with_sampling(Sampling::CLASSIFY)),
            extractor: Arc::new(llm.with_sampling(Sampling::EXTRACT)),
            faq: Arc::new(llm.with_sampling(Sampling::FAQ)),
            answer: Arc::new(llm.with_sampling(Sampling::ANSWER)),
        };
        let booking: Arc<dyn BookingApi> = Arc::new(GetInClient::new(&config.booking)?);
        let embedder = embedder_from_config(&config.embedding)?;
        let corpus = Arc::new(CorpusIndex::new(&config.rag, embedder));

        info!(
            event_name = "agent.runtime.ready",
            llm_provider = llm.provider(),
            default_unit = config.booking.default_unit_id.as_deref().unwrap_or("-"),
            corpus_dir = %config.rag.corpus_dir.display(),
            "agent runtime assembled"
        );

        Ok(Self::new(TurnWorkflow::new(
            models,
            booking,
            corpus,
            config.booking.default_unit_id.clone(),
            FaqLimits::from(&config.rag),
        )))
    }

    pub fn booking(&self) -> Arc<dyn BookingApi> {
        self.workflow.booking()
    }

    pub fn corpus(&self) -> &CorpusIndex {
        self.workflow.corpus()
    }

    /// Runs one conversation turn and returns the updated state.
    ///
    /// Never fails: every stage degrades to a structured error result or a
    /// canned reply.
    pub async fn handle_turn(&self, message: &str, previous: Option<AgentState>) -> AgentState {
        let state = AgentState::next_turn(previous, message);
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let span = tracing::info_span!(
            "turn",
            correlation_id = %state.conversation_id.unwrap_or_default(),
        );
        self.workflow.run(state, today).instrument(span).await
    }
}
