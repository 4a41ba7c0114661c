use mesa_agent::{AgentRuntime, AgentState};
use mesa_core::config::LoadOptions;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::commands::{block_on, load_config, CommandResult, EXIT_CONFIG, EXIT_IO};

const COMMAND: &str = "chat";
const EXIT_WORDS: [&str; 3] = ["sair", "exit", "quit"];
const RULE_WIDTH: usize = 60;

pub fn run(options: &LoadOptions, debug: bool) -> CommandResult {
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

    let session = block_on(COMMAND, async {
        let mut stdout = tokio::io::stdout();
        converse(&agent, BufReader::new(tokio::io::stdin()), &mut stdout, debug).await
    });
    match session {
        Ok(Ok(turns)) => CommandResult::success(COMMAND, format!("conversation ended after {turns} turns")),
        Ok(Err(error)) => CommandResult::failure(COMMAND, "io", error.to_string(), EXIT_IO),
        Err(failure) => failure,
    }
}

/// Interactive loop keeping one conversation state across turns.
///
/// Ends on an exit word or end of input and returns the number of turns run.
pub async fn converse<R, W>(
    agent: &AgentRuntime,
    input: R,
    output: &mut W,
    debug: bool,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let rule = "=".repeat(RULE_WIDTH);
    let banner = format!(
        "{rule}\n Mesa - assistente de reservas \n{rule}\n\
         Descreva a reserva que deseja fazer, por exemplo:\n  \
         \"Quero fazer uma reserva amanhã às 20h para 2 pessoas.\"\n\
         Para sair, digite: sair | exit | quit\n\n"
    );
    output.write_all(banner.as_bytes()).await?;

    let mut lines = input.lines();
    let mut state: Option<AgentState> = None;
    let mut turns = 0;

    loop {
        output.write_all("Você: ".as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&message.to_lowercase().as_str()) {
            break;
        }

        let next = agent.handle_turn(message, state.take()).await;
        turns += 1;

        if debug {
            let dump = json!({
                "intent": next.intent,
                "params": next.params,
                "action_result": next.action_result,
            });
            let pretty = serde_json::to_string_pretty(&dump).unwrap_or_else(|_| dump.to_string());
            output.write_all(format!("\n[DEBUG] STATE:\n{pretty}\n").as_bytes()).await?;
        }

        let answer = next.answer.as_deref().unwrap_or("Não consegui gerar uma resposta no momento.");
        output.write_all(format!("Assistente: {answer}\n{}\n", "-".repeat(RULE_WIDTH)).as_bytes()).await?;
        state = Some(next);
    }

    output.write_all("\nEncerrando. Até mais!\n".as_bytes()).await?;
    output.flush().await?;
    Ok(turns)
}
