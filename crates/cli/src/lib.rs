pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mesa_core::config::{ConfigOverrides, EmbeddingBackend, LlmProvider, LoadOptions};

use crate::commands::availability::AvailabilityArgs;

#[derive(Debug, Parser)]
#[command(
    name = "mesa",
    about = "Mesa restaurant reservation assistant",
    long_about = "Chat with the reservation assistant, query the documentation corpus, and inspect the reservation backend.",
    after_help = "Examples:\n  mesa chat --debug\n  mesa ask \"tem mesa pra 2 hoje às 20h?\" --state conversa.json\n  mesa retrieve \"qual o horário de funcionamento?\" --top-k 3\n  mesa availability --date amanhã --time 20h --people 4\n  mesa doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a mesa.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override the LLM provider (openai|anthropic|ollama)")]
    llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, help = "Override the LLM model name")]
    llm_model: Option<String>,
    #[arg(long, global = true, help = "Override the embedding provider (hashing|openai)")]
    embedding_provider: Option<EmbeddingBackend>,
    #[arg(long, global = true, help = "Override the documentation corpus directory")]
    corpus_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the default restaurant unit id")]
    default_unit: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Interactive conversation with the reservation assistant")]
    Chat {
        #[arg(long, help = "Print intent, params and action result after every turn")]
        debug: bool,
    },
    #[command(about = "Run a single conversation turn and print the resulting state as JSON")]
    Ask {
        message: String,
        #[arg(long, help = "State file to continue from and save to")]
        state: Option<PathBuf>,
    },
    #[command(about = "Search the documentation corpus and print the scored chunks")]
    Retrieve {
        query: String,
        #[arg(long, help = "Number of chunks to return (defaults to rag.top_k)")]
        top_k: Option<usize>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credentials, and documentation corpus readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List restaurant units known to the reservation backend")]
    Units {
        #[arg(long, help = "Filter units by name")]
        search: Option<String>,
    },
    #[command(about = "Check table availability for a date, time and party size")]
    Availability {
        #[arg(long, help = "Date such as 2025-12-24, 24/12/2025, hoje or amanhã")]
        date: String,
        #[arg(long, help = "Time such as 20:00, 20h, às 21h30 or jantar")]
        time: String,
        #[arg(long, help = "Party size")]
        people: u32,
        #[arg(long, help = "Unit id (defaults to booking.default_unit_id, else every unit)")]
        unit: Option<String>,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                log_level: self.log_level.clone(),
                booking_default_unit_id: self.default_unit.clone(),
                llm_provider: self.llm_provider,
                llm_model: self.llm_model.clone(),
                embedding_provider: self.embedding_provider,
                corpus_dir: self.corpus_dir.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Chat { debug } => commands::chat::run(&options, debug),
        Command::Ask { message, state } => commands::ask::run(&options, &message, state.as_deref()),
        Command::Retrieve { query, top_k } => commands::retrieve::run(&options, &query, top_k),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(&options, json) }
        }
        Command::Units { search } => commands::units::run(&options, search.as_deref()),
        Command::Availability { date, time, people, unit } => commands::availability::run(
            &options,
            &AvailabilityArgs { date, time, people, unit_id: unit },
        ),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
