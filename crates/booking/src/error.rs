use serde_json::Value;
use thiserror::Error;

/// Failure talking to the reservation backend.
///
/// `Api` covers every transport-level outcome: non-2xx responses, bodies that
/// are not JSON, and requests that never got a response (`status == 0`).
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{message} (status {status})")]
    Api { status: u16, message: String, body: Value },
    #[error("could not decode backend payload: {0}")]
    Decode(String),
    #[error("backend client setup failed: {0}")]
    Setup(String),
}

impl BookingError {
    pub(crate) fn network(error: &reqwest::Error) -> Self {
        Self::Api {
            status: 0,
            message: format!("Network error calling GET IN API: {error}"),
            body: Value::String(error.to_string()),
        }
    }

    /// Builds the error for a response with status `status` and parsed body `body`.
    pub fn from_response(status: u16, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("GET IN API request failed with status {status}"));
        Self::Api { status, message, body }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stable variant name, reported in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { .. } => "BookingError::Api",
            Self::Decode(_) => "BookingError::Decode",
            Self::Setup(_) => "BookingError::Setup",
        }
    }
}
