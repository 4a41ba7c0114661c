use std::collections::VecDeque;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use mesa_agent::actions::FaqLimits;
use mesa_agent::llm::{LlmClient, OracleError};
use mesa_agent::{AgentRuntime, StageModels, TurnWorkflow};
use mesa_booking::{
    AvailabilityQuery, BookingApi, BookingError, ReservationFilters, ReservationPage,
    ReservationPayload, UnitPage, UnitQuery,
};
use mesa_cli::commands::availability::{self, AvailabilityArgs};
use mesa_cli::commands::{ask, chat, config, doctor, retrieve, units};
use mesa_core::config::{LoadOptions, RagConfig};
use mesa_core::rag::HashingEmbedder;
use mesa_core::CorpusIndex;
use serde_json::{json, Value};
use tempfile::TempDir;

const MESA_KEYS: [&str; 24] = [
    "MESA_BOOKING_BASE_URL",
    "MESA_BOOKING_API_KEY",
    "MESA_BOOKING_DEFAULT_UNIT_ID",
    "MESA_BOOKING_TIMEOUT_SECS",
    "MESA_LLM_PROVIDER",
    "MESA_LLM_API_KEY",
    "MESA_LLM_BASE_URL",
    "MESA_LLM_MODEL",
    "MESA_LLM_TIMEOUT_SECS",
    "MESA_LLM_MAX_RETRIES",
    "MESA_EMBEDDING_PROVIDER",
    "MESA_EMBEDDING_MODEL",
    "MESA_EMBEDDING_BASE_URL",
    "MESA_EMBEDDING_API_KEY",
    "MESA_EMBEDDING_DIMENSIONS",
    "MESA_RAG_CORPUS_DIR",
    "MESA_RAG_CHUNK_SIZE",
    "MESA_RAG_CHUNK_OVERLAP",
    "MESA_RAG_TOP_K",
    "MESA_RAG_MAX_CONTEXT_CHUNKS",
    "MESA_LOGGING_LEVEL",
    "MESA_LOG_LEVEL",
    "MESA_LOGGING_FORMAT",
    "MESA_LOG_FORMAT",
];

struct Scripted {
    replies: Mutex<VecDeque<String>>,
}

impl Scripted {
    fn new(replies: &[&str]) -> Self {
        Self { replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()) }
    }
}

#[async_trait]
impl LlmClient for Scripted {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        self.replies.lock().expect("replies").pop_front().ok_or(OracleError::EmptyResponse)
    }
}

/// Two units and one open sector; records what it was asked.
#[derive(Default)]
struct SmallChain {
    unit_searches: Mutex<Vec<Option<String>>>,
    availability: Mutex<Vec<(Option<String>, AvailabilityQuery)>>,
}

#[async_trait]
impl BookingApi for SmallChain {
    async fn list_units(&self, query: &UnitQuery) -> Result<UnitPage, BookingError> {
        self.unit_searches.lock().expect("searches").push(query.search.clone());
        UnitPage::from_response(json!({
            "data": [
                {"id": "VPzzDDPQ", "name": "Mesa Centro", "city_slug": "sao-paulo"},
                {"id": 42, "name": "Mesa Jardins"}
            ],
            "pagination": {"page": 1, "total": 2}
        }))
    }

    async fn list_availability(&self, query: &AvailabilityQuery) -> Result<Value, BookingError> {
        self.availability.lock().expect("availability").push((None, query.clone()));
        Ok(json!({"data": []}))
    }

    async fn unit_availability(
        &self,
        unit_id: &str,
        query: &AvailabilityQuery,
    ) -> Result<Value, BookingError> {
        self.availability
            .lock()
            .expect("availability")
            .push((Some(unit_id.to_string()), query.clone()));
        Ok(json!({
            "success": true,
            "data": [{"hour": query.hour, "sector_id": "S1", "sector_name": "Varanda"}]
        }))
    }

    async fn create_reservation(&self, _payload: &ReservationPayload) -> Result<Value, BookingError> {
        Err(BookingError::from_response(422, json!({"message": "not in this test"})))
    }

    async fn delete_reservation(
        &self,
        _reservation_id: &str,
        _payload: &ReservationPayload,
    ) -> Result<Value, BookingError> {
        Err(BookingError::from_response(422, json!({"message": "not in this test"})))
    }

    async fn list_reservations(
        &self,
        _filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        ReservationPage::from_response(json!({"data": []}))
    }

    async fn next_reservations(
        &self,
        _filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        ReservationPage::from_response(json!({"data": []}))
    }
}

/// Unreachable backend.
struct Offline;

#[async_trait]
impl BookingApi for Offline {
    async fn list_units(&self, _query: &UnitQuery) -> Result<UnitPage, BookingError> {
        Err(offline())
    }

    async fn list_availability(&self, _query: &AvailabilityQuery) -> Result<Value, BookingError> {
        Err(offline())
    }

    async fn unit_availability(
        &self,
        _unit_id: &str,
        _query: &AvailabilityQuery,
    ) -> Result<Value, BookingError> {
        Err(offline())
    }

    async fn create_reservation(&self, _payload: &ReservationPayload) -> Result<Value, BookingError> {
        Err(offline())
    }

    async fn delete_reservation(
        &self,
        _reservation_id: &str,
        _payload: &ReservationPayload,
    ) -> Result<Value, BookingError> {
        Err(offline())
    }

    async fn list_reservations(
        &self,
        _filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        Err(offline())
    }

    async fn next_reservations(
        &self,
        _filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        Err(offline())
    }
}

fn offline() -> BookingError {
    BookingError::Api { status: 0, message: "connection refused".to_string(), body: Value::Null }
}

fn rag_config(corpus_dir: PathBuf) -> RagConfig {
    RagConfig { corpus_dir, chunk_size: 200, chunk_overlap: 20, top_k: 2, max_context_chunks: 1 }
}

fn corpus(dir: PathBuf) -> CorpusIndex {
    CorpusIndex::new(&rag_config(dir), Arc::new(HashingEmbedder::new(64).expect("embedder")))
}

fn agent(replies: &[&str]) -> AgentRuntime {
    let rag = rag_config(PathBuf::from("/nonexistent/mesa-cli-corpus"));
    let workflow = TurnWorkflow::new(
        StageModels::shared(Arc::new(Scripted::new(replies))),
        Arc::new(SmallChain::default()),
        Arc::new(corpus(rag.corpus_dir.clone())),
        Some("VPzzDDPQ".to_string()),
        FaqLimits::from(&rag),
    );
    AgentRuntime::new(workflow)
}

fn write_corpus() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("horarios.md"),
        "O restaurante funciona de terça a domingo, das 12h às 23h.",
    )
    .expect("write horarios");
    fs::write(
        dir.path().join("pets.txt"),
        "Aceitamos animais de estimação de pequeno porte na varanda.",
    )
    .expect("write pets");
    dir
}

#[test]
fn ask_returns_config_failure_without_booking_key() {
    with_env(&[], || {
        let result = ask::run(&LoadOptions::default(), "oi", None);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn retrieve_reads_corpus_from_env_directory() {
    let corpus_dir = write_corpus();
    let corpus_path = corpus_dir.path().display().to_string();
    with_env(
        &[("MESA_BOOKING_API_KEY", "getin-test"), ("MESA_RAG_CORPUS_DIR", corpus_path.as_str())],
        || {
            let result = retrieve::run(&LoadOptions::default(), "qual o horário de funcionamento?", Some(2));
            assert_eq!(result.exit_code, 0, "unexpected failure: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["top_k"], 2);
            let results = payload["results"].as_array().expect("results");
            assert_eq!(results.len(), 2);
            assert!(results[0]["score"].as_f64().expect("score") >= results[1]["score"].as_f64().expect("score"));
        },
    );
}

#[tokio::test]
async fn retrieve_rejects_zero_top_k() {
    let corpus_dir = write_corpus();
    let result = retrieve::retrieve(&corpus(corpus_dir.path().to_path_buf()), "pets", 0).await;

    assert_eq!(result.exit_code, 6);
    assert_eq!(parse_payload(&result.output)["error_class"], "invalid_argument");
}

#[tokio::test]
async fn retrieve_reports_missing_corpus() {
    let result =
        retrieve::retrieve(&corpus(PathBuf::from("/nonexistent/mesa-cli-corpus")), "pets", 2).await;

    assert_eq!(result.exit_code, 3);
    assert_eq!(parse_payload(&result.output)["error_class"], "retrieval");
}

#[test]
fn doctor_json_reports_every_check() {
    let corpus_dir = write_corpus();
    let corpus_path = corpus_dir.path().display().to_string();
    with_env(
        &[("MESA_BOOKING_API_KEY", "getin-test"), ("MESA_RAG_CORPUS_DIR", corpus_path.as_str())],
        || {
            let report = parse_payload(&doctor::run(&LoadOptions::default(), true));

            assert_eq!(report["overall_status"], "pass");
            let names: Vec<&str> = report["checks"]
                .as_array()
                .expect("checks")
                .iter()
                .map(|check| check["name"].as_str().expect("name"))
                .collect();
            assert_eq!(
                names,
                vec![
                    "config_validation",
                    "llm_credentials",
                    "embedding_provider",
                    "booking_credentials",
                    "corpus_build"
                ]
            );
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let report = parse_payload(&doctor::run(&LoadOptions::default(), true));

        assert_eq!(report["overall_status"], "fail");
        let checks = report["checks"].as_array().expect("checks");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

#[test]
fn doctor_human_output_flags_missing_llm_key() {
    with_env(&[("MESA_BOOKING_API_KEY", "getin-test"), ("MESA_LLM_PROVIDER", "openai")], || {
        let output = doctor::run(&LoadOptions::default(), false);

        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] llm_credentials"));
    });
}

#[test]
fn config_redacts_keys_and_attributes_sources() {
    with_env(
        &[
            ("MESA_BOOKING_API_KEY", "getin-live-secret"),
            ("MESA_LLM_PROVIDER", "openai"),
            ("MESA_LLM_API_KEY", "sk-very-secret"),
            ("MESA_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run(&LoadOptions::default());
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(!output.contains("getin-live-secret"));
            assert!(!output.contains("very-secret"));
            assert!(output.contains("- booking.api_key = <redacted> (source: env (MESA_BOOKING_API_KEY))"));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (MESA_LLM_API_KEY))"));
            assert!(output.contains("- logging.level = debug (source: env (MESA_LOG_LEVEL))"));
            assert!(output.contains("- rag.top_k = 3 (source: default)"));
        },
    );
}

#[tokio::test]
async fn chat_runs_until_exit_word() {
    let agent = agent(&["other", "{}", "Olá! Posso ajudar com reservas e dúvidas."]);
    let mut output = Vec::new();

    let turns = chat::converse(&agent, &b"oi\n\nsair\nnunca lido\n"[..], &mut output, false)
        .await
        .expect("conversation");

    let transcript = String::from_utf8(output).expect("utf8");
    assert_eq!(turns, 1);
    assert!(transcript.contains("Assistente: Olá! Posso ajudar com reservas e dúvidas."));
    assert!(transcript.ends_with("Encerrando. Até mais!\n"));
    assert!(!transcript.contains("[DEBUG]"));
}

#[tokio::test]
async fn chat_debug_dumps_state_after_each_turn() {
    let agent = agent(&["other", "{}", "Oi!"]);
    let mut output = Vec::new();

    chat::converse(&agent, &b"oi\n"[..], &mut output, true).await.expect("conversation");

    let transcript = String::from_utf8(output).expect("utf8");
    assert!(transcript.contains("[DEBUG] STATE:"));
    assert!(transcript.contains("\"intent\": \"other\""));
}

#[tokio::test]
async fn ask_saves_and_resumes_conversation_state() {
    let dir = TempDir::new().expect("tempdir");
    let state_path = dir.path().join("conversa.json");
    let agent = agent(&["other", "{}", "Oi!", "other", r#"{"name": "Ana"}"#, "Prazer, Ana!"]);

    let first = ask::ask(&agent, "oi", Some(&state_path)).await;
    assert_eq!(first.exit_code, 0, "unexpected failure: {}", first.output);
    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&state_path).expect("state file")).expect("json");
    assert_eq!(saved["answer"], "Oi!");

    let second = ask::ask(&agent, "meu nome é Ana", Some(&state_path)).await;
    let resumed = parse_payload(&second.output);
    assert_eq!(resumed["answer"], "Prazer, Ana!");
    assert_eq!(resumed["params"]["name"], "Ana");
    assert_eq!(resumed["conversation_id"], saved["conversation_id"]);
}

#[tokio::test]
async fn ask_rejects_a_corrupt_state_file() {
    let dir = TempDir::new().expect("tempdir");
    let state_path = dir.path().join("conversa.json");
    fs::write(&state_path, "not json").expect("write");

    let result = ask::ask(&agent(&[]), "oi", Some(&state_path)).await;

    assert_eq!(result.exit_code, 4);
    assert_eq!(parse_payload(&result.output)["error_class"], "state_file");
}

#[tokio::test]
async fn units_lists_backend_units() {
    let booking = SmallChain::default();

    let result = units::list(&booking, Some("mesa")).await;

    let payload = parse_payload(&result.output);
    assert_eq!(payload["units"][1]["id"], "42");
    assert_eq!(payload["pagination"]["total"], 2);
    assert_eq!(*booking.unit_searches.lock().expect("searches"), vec![Some("mesa".to_string())]);
}

#[tokio::test]
async fn units_reports_backend_failure() {
    let result = units::list(&Offline, None).await;

    assert_eq!(result.exit_code, 5);
    assert_eq!(parse_payload(&result.output)["error_class"], "BookingError::Api");
}

#[tokio::test]
async fn availability_normalizes_input_and_queries_one_unit() {
    let booking = SmallChain::default();
    let args = AvailabilityArgs {
        date: "2025-12-24".to_string(),
        time: "às 20h".to_string(),
        people: 4,
        unit_id: Some("VPzzDDPQ".to_string()),
    };

    let result = availability::check(&booking, &args).await;

    let payload = parse_payload(&result.output);
    assert_eq!(payload["hour"], "20:00");
    assert_eq!(payload["has_exact_slots"], true);
    assert_eq!(payload["available_sectors"][0]["sector_name"], "Varanda");
    let queries = booking.availability.lock().expect("availability");
    assert_eq!(queries[0].0.as_deref(), Some("VPzzDDPQ"));
    assert_eq!(queries[0].1.people, 4);
}

#[tokio::test]
async fn availability_without_unit_searches_every_unit() {
    let booking = SmallChain::default();
    let args = AvailabilityArgs {
        date: "2025-12-24".to_string(),
        time: "20:30".to_string(),
        people: 2,
        unit_id: None,
    };

    let result = availability::check(&booking, &args).await;

    let payload = parse_payload(&result.output);
    assert_eq!(payload["has_exact_slots"], false);
    assert_eq!(booking.availability.lock().expect("availability")[0].0, None);
}

#[tokio::test]
async fn availability_accepts_the_advertised_date_and_time_forms() {
    for (date, time, hour) in [
        ("24/12/2025", "20:00", "20:00"),
        ("2025-12-24", "20h", "20:00"),
        ("24/12/2025", "às 21h30", "21:30"),
        ("2025-12-24", "jantar", "20:00"),
    ] {
        let args = AvailabilityArgs {
            date: date.to_string(),
            time: time.to_string(),
            people: 2,
            unit_id: Some("VPzzDDPQ".to_string()),
        };

        let result = availability::check(&SmallChain::default(), &args).await;

        assert_eq!(result.exit_code, 0, "{date} {time}: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["date"], "2025-12-24", "{date}");
        assert_eq!(payload["hour"], hour, "{time}");
    }
}

#[tokio::test]
async fn availability_rejects_out_of_range_time() {
    let args = AvailabilityArgs {
        date: "2025-12-24".to_string(),
        time: "25:99".to_string(),
        people: 2,
        unit_id: None,
    };

    let result = availability::check(&SmallChain::default(), &args).await;

    assert_eq!(result.exit_code, 6);
    assert_eq!(parse_payload(&result.output)["error_class"], "invalid_argument");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test: impl FnOnce()) {
    let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let original = MESA_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect::<Vec<_>>();

    for key in MESA_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test();

    for (key, value) in original {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}

fn env_lock() -> &'static Mutex<()> {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}
