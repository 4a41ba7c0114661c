use mesa_core::config::{AppConfig, EmbeddingBackend, LlmProvider, LoadOptions};
use mesa_core::rag::embedder_from_config;
use mesa_core::CorpusIndex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::commands::block_on;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["llm_credentials", "embedding_provider", "booking_credentials", "corpus_build"];

pub fn run(options: &LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_llm_credentials(&config));
            checks.push(check_embedding_provider(&config));
            checks.push(check_booking_credentials(&config));
            checks.push(check_corpus_build(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn has_key(secret: Option<&SecretString>) -> bool {
    secret.is_some_and(|key| !key.expose_secret().trim().is_empty())
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    match llm.provider {
        LlmProvider::Ollama => DoctorCheck::pass(
            "llm_credentials",
            format!(
                "ollama model `{}` at {} (no key required)",
                llm.model,
                llm.base_url.as_deref().unwrap_or("<default>")
            ),
        ),
        provider if has_key(llm.api_key.as_ref()) => DoctorCheck::pass(
            "llm_credentials",
            format!("{provider:?} key present for model `{}`", llm.model),
        ),
        provider => DoctorCheck::fail(
            "llm_credentials",
            format!("{provider:?} requires llm.api_key (MESA_LLM_API_KEY)"),
        ),
    }
}

fn check_embedding_provider(config: &AppConfig) -> DoctorCheck {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingBackend::Hashing => DoctorCheck::pass(
            "embedding_provider",
            format!("local hashing embedder with {} dimensions", embedding.dimensions),
        ),
        EmbeddingBackend::OpenAi if has_key(embedding.api_key.as_ref()) => DoctorCheck::pass(
            "embedding_provider",
            format!("openai embeddings with model `{}`", embedding.model),
        ),
        EmbeddingBackend::OpenAi => DoctorCheck::fail(
            "embedding_provider",
            "openai embeddings require embedding.api_key (MESA_EMBEDDING_API_KEY)",
        ),
    }
}

fn check_booking_credentials(config: &AppConfig) -> DoctorCheck {
    let booking = &config.booking;
    if booking.api_key.expose_secret().trim().is_empty() {
        return DoctorCheck::fail("booking_credentials", "booking.api_key is empty");
    }
    let unit = booking.default_unit_id.as_deref().unwrap_or("<none>");
    DoctorCheck::pass(
        "booking_credentials",
        format!("key present for `{}` (default unit: {unit})", booking.base_url),
    )
}

fn check_corpus_build(config: &AppConfig) -> DoctorCheck {
    let embedder = match embedder_from_config(&config.embedding) {
        Ok(embedder) => embedder,
        Err(error) => return DoctorCheck::fail("corpus_build", error.to_string()),
    };
    let corpus = CorpusIndex::new(&config.rag, embedder);

    let built = match block_on("doctor", corpus.retriever()) {
        Ok(built) => built,
        Err(_) => return DoctorCheck::fail("corpus_build", "failed to initialize async runtime"),
    };

    match built {
        Ok(retriever) => DoctorCheck::pass(
            "corpus_build",
            format!(
                "indexed {} chunks from `{}`",
                retriever.store().len(),
                config.rag.corpus_dir.display()
            ),
        ),
        Err(error) => DoctorCheck::fail("corpus_build", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
