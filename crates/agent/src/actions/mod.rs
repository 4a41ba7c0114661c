//! Side-effecting actions, one per routable intent.
//!
//! Actions never fail: every outcome, including validation problems and
//! backend errors, comes back as an `ActionResult` for answer synthesis.

pub mod availability;
pub mod faq;
pub mod reservations;

use mesa_booking::{BookingApi, BookingError};
use mesa_core::normalize_time;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::sectors::AvailableSector;
use crate::state::Params;

pub use availability::check_availability;
pub use faq::{answer_with_rag, FaqLimits};
pub use reservations::{
    cancel_reservation, create_reservation, list_reservations, view_next_reservation,
};

pub const UNKNOWN_INTENT_MESSAGE: &str =
    "Não consegui entender exatamente o que você deseja fazer. Você pode reformular sua pergunta?";

/// Collaborators the booking actions share.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub booking: &'a dyn BookingApi,
    pub default_unit_id: Option<&'a str>,
}

impl ActionContext<'_> {
    pub fn unit_id(&self, params: &Params) -> Option<String> {
        Params::text(&params.unit_id).or(self.default_unit_id).map(str::to_string)
    }
}

/// Headcounts must be positive and fit the backend's integer type.
pub(crate) fn headcount(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|count| *count > 0)
}

/// Best-effort `HH:MM`; unparseable input is passed through untouched.
pub(crate) fn normalized_time(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|text| !text.is_empty())?;
    Some(normalize_time(raw).unwrap_or_else(|_| raw.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Availability,
    CreateReservation,
    ViewNextReservation,
    ListReservations,
    CancelReservation,
    RestaurantFaq,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingParams,
    MissingFilters,
    InvalidParam,
    ApiError,
    UnexpectedError,
    UnknownIntent,
    RagRetrievalError,
    RagGenerationError,
    NotFound,
    AmbiguousReservation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ActionError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self { code, message: message.into(), details }
    }

    pub fn missing_fields(code: ErrorCode, message_prefix: &str, missing: &[&str]) -> Self {
        Self::new(
            code,
            format!("{message_prefix}{}", missing.join(", ")),
            json!({ "missing_fields": missing }),
        )
    }

    /// `API_ERROR` for backend rejections, `UNEXPECTED_ERROR` for anything else.
    pub fn from_booking(error: &BookingError, api_message: &str, unexpected_message: &str) -> Self {
        match error {
            BookingError::Api { status, body, .. } => Self::new(
                ErrorCode::ApiError,
                api_message,
                json!({
                    "status_code": status,
                    "response_body": body,
                    "exception_message": error.to_string(),
                }),
            ),
            other => Self::unexpected(unexpected_message, other.kind(), &other.to_string()),
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    pub fn unexpected(message: &str, exception_type: &str, exception_message: &str) -> Self {
        Self::new(
            ErrorCode::UnexpectedError,
            message,
            json!({ "exception_type": exception_type, "exception_message": exception_message }),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqMeta {
    pub used_rag: bool,
    pub chunks_count: usize,
}

/// Kind-specific payload carried by a successful result.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionDetail {
    None,
    Availability { available_sectors: Vec<AvailableSector>, has_exact_slots: bool },
    Faq { answer: String, meta: FaqMeta },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    Success { response: Option<Value>, detail: ActionDetail },
    Failure(ActionError),
}

/// Result of one dispatched action.
///
/// Serializes to the flat `{type, ok, request, response, error, ...}` shape
/// that answer prompts and persisted state use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "FlatActionResult", try_from = "FlatActionResult")]
pub struct ActionResult {
    pub kind: ActionKind,
    pub request: Value,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn success(kind: ActionKind, request: Value, response: Value) -> Self {
        Self {
            kind,
            request,
            outcome: ActionOutcome::Success { response: Some(response), detail: ActionDetail::None },
        }
    }

    pub fn failure(kind: ActionKind, request: Value, error: ActionError) -> Self {
        Self { kind, request, outcome: ActionOutcome::Failure(error) }
    }

    pub fn unknown_intent(params: Value) -> Self {
        Self::failure(
            ActionKind::Unknown,
            json!({ "params": params }),
            ActionError::new(ErrorCode::UnknownIntent, UNKNOWN_INTENT_MESSAGE, Value::Null),
        )
    }

    pub fn ok(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&ActionError> {
        match &self.outcome {
            ActionOutcome::Failure(error) => Some(error),
            ActionOutcome::Success { .. } => None,
        }
    }

    pub fn response(&self) -> Option<&Value> {
        match &self.outcome {
            ActionOutcome::Success { response, .. } => response.as_ref(),
            ActionOutcome::Failure(_) => None,
        }
    }

    pub fn available_sectors(&self) -> &[AvailableSector] {
        match &self.outcome {
            ActionOutcome::Success {
                detail: ActionDetail::Availability { available_sectors, .. }, ..
            } => available_sectors,
            _ => &[],
        }
    }

    /// The FAQ answer, when this is a successful documentation lookup.
    pub fn faq_answer(&self) -> Option<&str> {
        match &self.outcome {
            ActionOutcome::Success { detail: ActionDetail::Faq { answer, .. }, .. } => {
                Some(answer)
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(FlatActionResult::from(self.clone())).unwrap_or(Value::Null)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FlatActionResult {
    #[serde(rename = "type")]
    kind: ActionKind,
    ok: bool,
    #[serde(default)]
    request: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ActionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    available_sectors: Option<Vec<AvailableSector>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_exact_slots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<FaqMeta>,
}

impl From<ActionResult> for FlatActionResult {
    fn from(result: ActionResult) -> Self {
        let mut flat = FlatActionResult {
            kind: result.kind,
            ok: false,
            request: result.request,
            response: None,
            error: None,
            available_sectors: None,
            has_exact_slots: None,
            answer: None,
            meta: None,
        };
        match result.outcome {
            ActionOutcome::Failure(error) => flat.error = Some(error),
            ActionOutcome::Success { response, detail } => {
                flat.ok = true;
                flat.response = response;
                match detail {
                    ActionDetail::None => {}
                    ActionDetail::Availability { available_sectors, has_exact_slots } => {
                        flat.available_sectors = Some(available_sectors);
                        flat.has_exact_slots = Some(has_exact_slots);
                    }
                    ActionDetail::Faq { answer, meta } => {
                        flat.answer = Some(answer);
                        flat.meta = Some(meta);
                    }
                }
            }
        }
        flat
    }
}

impl TryFrom<FlatActionResult> for ActionResult {
    type Error = String;

    fn try_from(flat: FlatActionResult) -> Result<Self, Self::Error> {
        let outcome = if flat.ok {
            let detail = match flat.kind {
                ActionKind::Availability => ActionDetail::Availability {
                    available_sectors: flat.available_sectors.unwrap_or_default(),
                    has_exact_slots: flat.has_exact_slots.unwrap_or(false),
                },
                ActionKind::RestaurantFaq => ActionDetail::Faq {
                    answer: flat.answer.unwrap_or_default(),
                    meta: flat.meta.unwrap_or(FaqMeta { used_rag: true, chunks_count: 0 }),
                },
                _ => ActionDetail::None,
            };
            ActionOutcome::Success { response: flat.response, detail }
        } else {
            let error = flat
                .error
                .ok_or_else(|| "action result with ok=false must carry an error".to_string())?;
            ActionOutcome::Failure(error)
        };
        Ok(Self { kind: flat.kind, request: flat.request, outcome })
    }
}
