//! Restaurant reservation assistant
//!
//! This crate is the conversational core of mesa. Every guest message runs
//! through the same four-stage pipeline (see `workflow`):
//! 1. **Classify** (`intent`) - map the message onto one routable intent,
//!    keeping an in-progress intent when the new one is just `other`
//! 2. **Extract** (`extractor`) - pull date, time, party size and contact
//!    details out of the message and merge them into the conversation state
//! 3. **Dispatch** (`actions`) - run exactly one action against the booking
//!    backend or the documentation corpus
//! 4. **Answer** (`answer`) - turn the action result into a PT-BR reply
//!
//! # Key Types
//!
//! - `AgentRuntime` - composition root and conversation entry point
//! - `AgentState` - per-conversation state the caller keeps between turns
//! - `LlmClient` - single-method oracle capability (OpenAI/Anthropic/Ollama)
//! - `ActionResult` - uniform action outcome consumed by answer synthesis
//!
//! # Failure Principle
//!
//! A turn never fails. Validation problems and backend errors become
//! structured `ActionError`s, and an unavailable oracle degrades to a canned
//! reply.

pub mod actions;
pub mod answer;
pub mod extractor;
pub mod intent;
pub mod llm;
pub mod runtime;
pub mod sectors;
pub mod state;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use actions::{ActionError, ActionKind, ActionResult, ErrorCode};
pub use intent::Intent;
pub use llm::{HttpLlmClient, LlmClient, OracleError};
pub use runtime::{AgentRuntime, RuntimeError};
pub use state::{AgentState, Params};
pub use workflow::{StageModels, TurnWorkflow};
