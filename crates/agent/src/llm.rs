use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mesa_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Text-completion capability used by every stage of a turn.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("llm returned an empty completion")]
    EmptyResponse,
    #[error("llm client misconfigured: {0}")]
    Configuration(String),
}

impl OracleError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "OracleError::Transport",
            Self::Api { .. } => "OracleError::Api",
            Self::EmptyResponse => "OracleError::EmptyResponse",
            Self::Configuration(_) => "OracleError::Configuration",
        }
    }
}

/// Wraps a stage instruction and the guest's message into one prompt.
pub fn build_single_turn_prompt(system_prompt: &str, user_input: &str) -> String {
    format!(
        "{}\n\nMensagem do usuário:\n\"\"\"{}\"\"\"\n\nResposta:",
        system_prompt.trim(),
        user_input.trim()
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Sampling {
    pub const CLASSIFY: Self = Self { temperature: 0.0, max_tokens: 64 };
    pub const EXTRACT: Self = Self { temperature: 0.0, max_tokens: 256 };
    pub const FAQ: Self = Self { temperature: 0.1, max_tokens: 256 };
    pub const ANSWER: Self = Self { temperature: 0.2, max_tokens: 512 };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 4_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u64 << attempt.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms))
    }
}

#[derive(Debug)]
enum Backend {
    OpenAi { endpoint: String, api_key: SecretString },
    Anthropic { endpoint: String, api_key: SecretString },
    Ollama { endpoint: String },
}

impl Backend {
    fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let base_url = config.base_url.as_deref().map(|url| url.trim_end_matches('/'));
        let api_key = || {
            config
                .api_key
                .clone()
                .filter(|key| !key.expose_secret().trim().is_empty())
                .ok_or_else(|| OracleError::Configuration("llm.api_key is required".to_string()))
        };

        match config.provider {
            LlmProvider::OpenAi => Ok(Self::OpenAi {
                endpoint: format!("{}/chat/completions", base_url.unwrap_or(OPENAI_BASE_URL)),
                api_key: api_key()?,
            }),
            LlmProvider::Anthropic => Ok(Self::Anthropic {
                endpoint: format!("{}/v1/messages", base_url.unwrap_or(ANTHROPIC_BASE_URL)),
                api_key: api_key()?,
            }),
            LlmProvider::Ollama => {
                let base_url = base_url.ok_or_else(|| {
                    OracleError::Configuration("llm.base_url is required for ollama".to_string())
                })?;
                Ok(Self::Ollama { endpoint: format!("{base_url}/api/chat") })
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Anthropic { .. } => "anthropic",
            Self::Ollama { .. } => "ollama",
        }
    }
}

/// `LlmClient` over the provider's HTTP API.
///
/// Clones share the connection pool; `with_sampling` is how each stage gets
/// its own temperature and output budget.
#[derive(Clone, Debug)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    backend: Arc<Backend>,
    model: String,
    sampling: Sampling,
    retry: RetryPolicy,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let backend = Backend::from_config(config)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| OracleError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            backend: Arc::new(backend),
            model: config.model.clone(),
            sampling: Sampling::ANSWER,
            retry: RetryPolicy { max_retries: config.max_retries, ..RetryPolicy::default() },
        })
    }

    pub fn with_sampling(&self, sampling: Sampling) -> Self {
        Self { sampling, ..self.clone() }
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn provider(&self) -> &'static str {
        self.backend.name()
    }

    fn request_body(&self, prompt: &str) -> Value {
        let messages = json!([{ "role": "user", "content": prompt }]);
        match self.backend.as_ref() {
            Backend::OpenAi { .. } | Backend::Anthropic { .. } => json!({
                "model": self.model,
                "messages": messages,
                "temperature": self.sampling.temperature,
                "max_tokens": self.sampling.max_tokens,
            }),
            Backend::Ollama { .. } => json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
                "options": {
                    "temperature": self.sampling.temperature,
                    "num_predict": self.sampling.max_tokens,
                },
            }),
        }
    }

    async fn send_once(&self, prompt: &str) -> Result<String, OracleError> {
        let body = self.request_body(prompt);
        let request = match self.backend.as_ref() {
            Backend::OpenAi { endpoint, api_key } => {
                self.http.post(endpoint).bearer_auth(api_key.expose_secret())
            }
            Backend::Anthropic { endpoint, api_key } => self
                .http
                .post(endpoint)
                .header("x-api-key", api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION),
            Backend::Ollama { endpoint } => self.http.post(endpoint),
        };

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|error| OracleError::Transport(error.to_string()))?;
        let status = response.status();
        let text =
            response.text().await.map_err(|error| OracleError::Transport(error.to_string()))?;

        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: provider_error_message(&text),
            });
        }

        let payload: Value = serde_json::from_str(&text).map_err(|error| OracleError::Api {
            status: status.as_u16(),
            message: format!("invalid json from provider: {error}"),
        })?;
        completion_text(self.backend.as_ref(), &payload).ok_or(OracleError::EmptyResponse)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let mut attempt = 0;
        loop {
            match self.send_once(prompt).await {
                Ok(text) if text.trim().is_empty() => return Err(OracleError::EmptyResponse),
                Ok(text) => {
                    debug!(
                        event_name = "llm.completion",
                        provider = self.provider(),
                        attempt,
                        chars = text.len(),
                        "llm completion received"
                    );
                    return Ok(text.trim().to_string());
                }
                Err(OracleError::Transport(message)) if attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        event_name = "llm.retry",
                        provider = self.provider(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "llm transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn completion_text(backend: &Backend, payload: &Value) -> Option<String> {
    let text = match backend {
        Backend::OpenAi { .. } => payload.pointer("/choices/0/message/content"),
        Backend::Ollama { .. } => payload.pointer("/message/content"),
        Backend::Anthropic { .. } => payload
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.iter().find(|block| block.get("text").is_some()))
            .and_then(|block| block.get("text")),
    };
    text.and_then(Value::as_str).map(str::to_string)
}

fn provider_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.chars().take(300).collect())
}
