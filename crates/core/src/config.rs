use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub booking: BookingConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub default_unit_id: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub dimensions: usize,
}

#[derive(Clone, Debug)]
pub struct RagConfig {
    pub corpus_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_context_chunks: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai", alias = "deepseek")]
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Hashing,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub booking_api_key: Option<String>,
    pub booking_default_unit_id: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub embedding_provider: Option<EmbeddingBackend>,
    pub corpus_dir: Option<PathBuf>,
    pub top_k: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["mesa.toml", "config/mesa.toml"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            booking: BookingConfig {
                base_url: "https://api.getinapis.com/apis/v2".to_string(),
                api_key: String::new().into(),
                default_unit_id: None,
                timeout_secs: 10,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingBackend::Hashing,
                model: "text-embedding-3-small".to_string(),
                base_url: None,
                api_key: None,
                dimensions: 384,
            },
            rag: RagConfig {
                corpus_dir: PathBuf::from("docs/rag"),
                chunk_size: 500,
                chunk_overlap: 100,
                top_k: 3,
                max_context_chunks: 1,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "deepseek" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::Validation(format!(
                "unsupported embedding provider `{other}` (expected hashing|openai)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(booking) = patch.booking {
            if let Some(base_url) = booking.base_url {
                self.booking.base_url = base_url;
            }
            if let Some(api_key) = booking.api_key {
                self.booking.api_key = secret_value(api_key);
            }
            if let Some(default_unit_id) = booking.default_unit_id {
                self.booking.default_unit_id = Some(default_unit_id);
            }
            if let Some(timeout_secs) = booking.timeout_secs {
                self.booking.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(provider) = embedding.provider {
                self.embedding.provider = provider;
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = Some(base_url);
            }
            if let Some(api_key) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(api_key));
            }
            if let Some(dimensions) = embedding.dimensions {
                self.embedding.dimensions = dimensions;
            }
        }

        if let Some(rag) = patch.rag {
            if let Some(corpus_dir) = rag.corpus_dir {
                self.rag.corpus_dir = corpus_dir;
            }
            if let Some(chunk_size) = rag.chunk_size {
                self.rag.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = rag.chunk_overlap {
                self.rag.chunk_overlap = chunk_overlap;
            }
            if let Some(top_k) = rag.top_k {
                self.rag.top_k = top_k;
            }
            if let Some(max_context_chunks) = rag.max_context_chunks {
                self.rag.max_context_chunks = max_context_chunks;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MESA_BOOKING_BASE_URL") {
            self.booking.base_url = value;
        }
        if let Some(value) = read_env("MESA_BOOKING_API_KEY") {
            self.booking.api_key = secret_value(value);
        }
        if let Some(value) = read_env("MESA_BOOKING_DEFAULT_UNIT_ID") {
            self.booking.default_unit_id = Some(value);
        }
        if let Some(value) = read_env("MESA_BOOKING_TIMEOUT_SECS") {
            self.booking.timeout_secs = parse_u64("MESA_BOOKING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MESA_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("MESA_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MESA_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("MESA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("MESA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MESA_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MESA_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("MESA_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("MESA_EMBEDDING_PROVIDER") {
            self.embedding.provider = value.parse()?;
        }
        if let Some(value) = read_env("MESA_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("MESA_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(value);
        }
        if let Some(value) = read_env("MESA_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MESA_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_usize("MESA_EMBEDDING_DIMENSIONS", &value)?;
        }

        if let Some(value) = read_env("MESA_RAG_CORPUS_DIR") {
            self.rag.corpus_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("MESA_RAG_CHUNK_SIZE") {
            self.rag.chunk_size = parse_usize("MESA_RAG_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = read_env("MESA_RAG_CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_usize("MESA_RAG_CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = read_env("MESA_RAG_TOP_K") {
            self.rag.top_k = parse_usize("MESA_RAG_TOP_K", &value)?;
        }
        if let Some(value) = read_env("MESA_RAG_MAX_CONTEXT_CHUNKS") {
            self.rag.max_context_chunks = parse_usize("MESA_RAG_MAX_CONTEXT_CHUNKS", &value)?;
        }

        let log_level = read_env("MESA_LOGGING_LEVEL").or_else(|| read_env("MESA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("MESA_LOGGING_FORMAT").or_else(|| read_env("MESA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.booking_api_key {
            self.booking.api_key = secret_value(api_key);
        }
        if let Some(unit_id) = overrides.booking_default_unit_id {
            self.booking.default_unit_id = Some(unit_id);
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(corpus_dir) = overrides.corpus_dir {
            self.rag.corpus_dir = corpus_dir;
        }
        if let Some(top_k) = overrides.top_k {
            self.rag.top_k = top_k;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_booking(&self.booking)?;
        validate_llm(&self.llm)?;
        validate_embedding(&self.embedding)?;
        validate_rag(&self.rag)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Returns the first config file that exists, honoring an explicit path when given.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    let base_url = booking.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "booking.base_url must start with http:// or https://".to_string(),
        ));
    }

    if booking.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "booking.api_key is required (set MESA_BOOKING_API_KEY or [booking].api_key)"
                .to_string(),
        ));
    }

    if booking.timeout_secs == 0 || booking.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "booking.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            if is_blank_secret(llm.api_key.as_ref()) {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    if embedding.dimensions == 0 {
        return Err(ConfigError::Validation(
            "embedding.dimensions must be greater than zero".to_string(),
        ));
    }

    if embedding.provider == EmbeddingBackend::OpenAi && is_blank_secret(embedding.api_key.as_ref())
    {
        return Err(ConfigError::Validation(
            "embedding.api_key is required for the openai embedding provider".to_string(),
        ));
    }

    Ok(())
}

fn validate_rag(rag: &RagConfig) -> Result<(), ConfigError> {
    if rag.chunk_size == 0 {
        return Err(ConfigError::Validation(
            "rag.chunk_size must be greater than zero".to_string(),
        ));
    }
    if rag.chunk_overlap >= rag.chunk_size {
        return Err(ConfigError::Validation(
            "rag.chunk_overlap must be smaller than rag.chunk_size".to_string(),
        ));
    }
    if rag.top_k == 0 {
        return Err(ConfigError::Validation("rag.top_k must be greater than zero".to_string()));
    }
    if rag.max_context_chunks == 0 {
        return Err(ConfigError::Validation(
            "rag.max_context_chunks must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_blank_secret(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    booking: Option<BookingPatch>,
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    rag: Option<RagPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    default_unit_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    provider: Option<EmbeddingBackend>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    dimensions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RagPatch {
    corpus_dir: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    top_k: Option<usize>,
    max_context_chunks: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
