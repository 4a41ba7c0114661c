//! In-memory stand-ins for the oracle and the booking backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use mesa_booking::{
    AvailabilityQuery, BookingApi, BookingError, ReservationFilters, ReservationPage,
    ReservationPayload, UnitPage, UnitQuery,
};
use serde_json::{json, Value};

use crate::llm::{LlmClient, OracleError};

/// Replays canned completions in order and records every prompt.
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|reply| Ok(reply.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let replies = VecDeque::from([Err(OracleError::Transport("connection reset".to_string()))]);
        Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().expect("prompts lock").push(prompt.to_string());
        self.replies.lock().expect("replies lock").pop_front().unwrap_or(Err(OracleError::EmptyResponse))
    }
}

pub(crate) enum Reply {
    Body(Value),
    Status(u16, Value),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Call {
    pub operation: &'static str,
    pub target: Option<String>,
    pub input: Value,
}

/// Booking backend whose replies are queued per operation name.
///
/// An operation without a queued reply answers `{"success": true, "data": []}`.
#[derive(Default)]
pub(crate) struct FakeBooking {
    replies: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBooking {
    pub fn reply(self, operation: &'static str, reply: Reply) -> Self {
        self.replies.lock().expect("replies lock").entry(operation).or_default().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn answer(
        &self,
        operation: &'static str,
        target: Option<&str>,
        input: Value,
    ) -> Result<Value, BookingError> {
        self.calls.lock().expect("calls lock").push(Call {
            operation,
            target: target.map(str::to_string),
            input,
        });
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status, body)) => Err(BookingError::from_response(status, body)),
            None => Ok(json!({"success": true, "data": []})),
        }
    }
}

fn pairs_to_json(pairs: Vec<(&'static str, String)>) -> Value {
    Value::Object(pairs.into_iter().map(|(key, value)| (key.to_string(), json!(value))).collect())
}

#[async_trait]
impl BookingApi for FakeBooking {
    async fn list_units(&self, query: &UnitQuery) -> Result<UnitPage, BookingError> {
        UnitPage::from_response(self.answer("list_units", None, pairs_to_json(query.query_pairs()))?)
    }

    async fn list_availability(&self, query: &AvailabilityQuery) -> Result<Value, BookingError> {
        self.answer("list_availability", None, pairs_to_json(query.query_pairs()))
    }

    async fn unit_availability(
        &self,
        unit_id: &str,
        query: &AvailabilityQuery,
    ) -> Result<Value, BookingError> {
        self.answer("unit_availability", Some(unit_id), pairs_to_json(query.query_pairs()))
    }

    async fn create_reservation(&self, payload: &ReservationPayload) -> Result<Value, BookingError> {
        let input = serde_json::to_value(payload).expect("payload serializes");
        self.answer("create_reservation", None, input)
    }

    async fn delete_reservation(
        &self,
        reservation_id: &str,
        payload: &ReservationPayload,
    ) -> Result<Value, BookingError> {
        let input = serde_json::to_value(payload).expect("payload serializes");
        self.answer("delete_reservation", Some(reservation_id), input)
    }

    async fn list_reservations(
        &self,
        filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        let body = self.answer("list_reservations", None, pairs_to_json(filters.query_pairs()))?;
        ReservationPage::from_response(body)
    }

    async fn next_reservations(
        &self,
        filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        let body =
            self.answer("next_reservations", None, pairs_to_json(filters.next_query_pairs()))?;
        Ok(ReservationPage::from_next_response(body))
    }
}
