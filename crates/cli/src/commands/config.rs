use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use mesa_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

const COMMAND: &str = "config";

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    flag: Option<&'static str>,
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys, flag: None }
    }

    fn flag(mut self, flag: &'static str, is_set: bool) -> Self {
        if is_set {
            self.flag = Some(flag);
        }
        self
    }
}

/// Effective configuration with the source of every field, secrets redacted.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config, options) {
        let source = match field.flag {
            Some(flag) => format!("flag ({flag})"),
            None => field_source(
                field.key,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        };
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig, options: &LoadOptions) -> Vec<Field> {
    let overrides = &options.overrides;
    let booking = &config.booking;
    let llm = &config.llm;
    let embedding = &config.embedding;
    let rag = &config.rag;

    vec![
        Field::new("booking.base_url", booking.base_url.as_str(), &["MESA_BOOKING_BASE_URL"]),
        Field::new("booking.api_key", redact_key(&booking.api_key), &["MESA_BOOKING_API_KEY"]),
        Field::new(
            "booking.default_unit_id",
            booking.default_unit_id.as_deref().unwrap_or("<unset>"),
            &["MESA_BOOKING_DEFAULT_UNIT_ID"],
        )
        .flag("--default-unit", overrides.booking_default_unit_id.is_some()),
        Field::new(
            "booking.timeout_secs",
            booking.timeout_secs.to_string(),
            &["MESA_BOOKING_TIMEOUT_SECS"],
        ),
        Field::new("llm.provider", format!("{:?}", llm.provider), &["MESA_LLM_PROVIDER"])
            .flag("--llm-provider", overrides.llm_provider.is_some()),
        Field::new("llm.model", llm.model.as_str(), &["MESA_LLM_MODEL"])
            .flag("--llm-model", overrides.llm_model.is_some()),
        Field::new(
            "llm.base_url",
            llm.base_url.as_deref().unwrap_or("<unset>"),
            &["MESA_LLM_BASE_URL"],
        ),
        Field::new("llm.api_key", redact_optional(llm.api_key.as_ref()), &["MESA_LLM_API_KEY"]),
        Field::new("llm.timeout_secs", llm.timeout_secs.to_string(), &["MESA_LLM_TIMEOUT_SECS"]),
        Field::new("llm.max_retries", llm.max_retries.to_string(), &["MESA_LLM_MAX_RETRIES"]),
        Field::new(
            "embedding.provider",
            format!("{:?}", embedding.provider),
            &["MESA_EMBEDDING_PROVIDER"],
        )
        .flag("--embedding-provider", overrides.embedding_provider.is_some()),
        Field::new("embedding.model", embedding.model.as_str(), &["MESA_EMBEDDING_MODEL"]),
        Field::new(
            "embedding.base_url",
            embedding.base_url.as_deref().unwrap_or("<unset>"),
            &["MESA_EMBEDDING_BASE_URL"],
        ),
        Field::new(
            "embedding.api_key",
            redact_optional(embedding.api_key.as_ref()),
            &["MESA_EMBEDDING_API_KEY"],
        ),
        Field::new(
            "embedding.dimensions",
            embedding.dimensions.to_string(),
            &["MESA_EMBEDDING_DIMENSIONS"],
        ),
        Field::new("rag.corpus_dir", rag.corpus_dir.display().to_string(), &["MESA_RAG_CORPUS_DIR"])
            .flag("--corpus-dir", overrides.corpus_dir.is_some()),
        Field::new("rag.chunk_size", rag.chunk_size.to_string(), &["MESA_RAG_CHUNK_SIZE"]),
        Field::new("rag.chunk_overlap", rag.chunk_overlap.to_string(), &["MESA_RAG_CHUNK_OVERLAP"]),
        Field::new("rag.top_k", rag.top_k.to_string(), &["MESA_RAG_TOP_K"]),
        Field::new(
            "rag.max_context_chunks",
            rag.max_context_chunks.to_string(),
            &["MESA_RAG_MAX_CONTEXT_CHUNKS"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.as_str(),
            &["MESA_LOGGING_LEVEL", "MESA_LOG_LEVEL"],
        )
        .flag("--log-level", overrides.log_level.is_some()),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["MESA_LOGGING_FORMAT", "MESA_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    secret.map(redact_key).unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps a recognizable vendor prefix (`sk-`, `sk-ant-`) and hides the rest.
fn redact_key(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.len() <= 4 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}
