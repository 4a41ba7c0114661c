use std::path::Path;

use mesa_agent::{AgentRuntime, AgentState};
use mesa_core::config::LoadOptions;

use crate::commands::{block_on, load_config, CommandResult, EXIT_CONFIG, EXIT_IO};

const COMMAND: &str = "ask";

pub fn run(options: &LoadOptions, message: &str, state_path: Option<&Path>) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let agent = match AgentRuntime::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure(COMMAND, "agent_setup", error.to_string(), EXIT_CONFIG)
        }
    };

    block_on(COMMAND, ask(&agent, message, state_path)).unwrap_or_else(|failure| failure)
}

/// One turn, optionally continuing from and saving to a state file.
///
/// A missing state file starts a new conversation.
pub async fn ask(agent: &AgentRuntime, message: &str, state_path: Option<&Path>) -> CommandResult {
    let previous = match state_path {
        Some(path) => match read_state(path).await {
            Ok(previous) => previous,
            Err(failure) => return failure,
        },
        None => None,
    };

    let state = agent.handle_turn(message, previous).await;

    if let Some(path) = state_path {
        if let Err(failure) = write_state(path, &state).await {
            return failure;
        }
    }
    CommandResult::json(COMMAND, &state)
}

async fn read_state(path: &Path) -> Result<Option<AgentState>, CommandResult> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(CommandResult::failure(
                COMMAND,
                "state_file",
                format!("could not read `{}`: {error}", path.display()),
                EXIT_IO,
            ))
        }
    };
    serde_json::from_str(&raw).map(Some).map_err(|error| {
        CommandResult::failure(
            COMMAND,
            "state_file",
            format!("`{}` is not a saved conversation: {error}", path.display()),
            EXIT_IO,
        )
    })
}

async fn write_state(path: &Path, state: &AgentState) -> Result<(), CommandResult> {
    let io_failure = |error: String| {
        CommandResult::failure(
            COMMAND,
            "state_file",
            format!("could not write `{}`: {error}", path.display()),
            EXIT_IO,
        )
    };
    let encoded = serde_json::to_string_pretty(state).map_err(|error| io_failure(error.to_string()))?;
    tokio::fs::write(path, encoded).await.map_err(|error| io_failure(error.to_string()))
}
