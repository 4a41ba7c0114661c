use std::time::Duration;

use async_trait::async_trait;
use mesa_core::config::BookingConfig;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::BookingError;
use crate::models::{
    AvailabilityQuery, ReservationFilters, ReservationPage, ReservationPayload, UnitPage,
    UnitQuery,
};

/// Operations the agent needs from the reservation backend.
///
/// Successful calls hand back the decoded JSON body. Callers that only pass
/// data through (availability, create, delete) keep it as `Value`.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_units(&self, query: &UnitQuery) -> Result<UnitPage, BookingError>;

    /// Availability across every unit for a date, time and party size.
    async fn list_availability(&self, query: &AvailabilityQuery) -> Result<Value, BookingError>;

    async fn unit_availability(
        &self,
        unit_id: &str,
        query: &AvailabilityQuery,
    ) -> Result<Value, BookingError>;

    async fn create_reservation(&self, payload: &ReservationPayload) -> Result<Value, BookingError>;

    async fn delete_reservation(
        &self,
        reservation_id: &str,
        payload: &ReservationPayload,
    ) -> Result<Value, BookingError>;

    async fn list_reservations(
        &self,
        filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError>;

    async fn next_reservations(
        &self,
        filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError>;
}

/// HTTP client for the GET IN partner API.
#[derive(Clone)]
pub struct GetInClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for GetInClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GetInClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GetInClient {
    pub fn new(config: &BookingConfig) -> Result<Self, BookingError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(BookingError::Setup("booking api key must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| BookingError::Setup(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&ReservationPayload>,
    ) -> Result<Value, BookingError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(event_name = "booking.request", method = %method, path, "calling booking api");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("apiKey", self.api_key.expose_secret())
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| {
            warn!(
                event_name = "booking.request.failed",
                method = %method,
                path,
                error = %error,
                "booking api unreachable"
            );
            BookingError::network(&error)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| BookingError::network(&error))?;
        let body = parse_body(status, &text)?;

        if !status.is_success() {
            let error = BookingError::from_response(status.as_u16(), body);
            warn!(
                event_name = "booking.request.failed",
                method = %method,
                path,
                status = status.as_u16(),
                error = %error,
                "booking api returned an error"
            );
            return Err(error);
        }
        Ok(body)
    }
}

/// Bodies must be JSON. Only `204 No Content` may be empty, and decodes to `null`.
fn parse_body(status: StatusCode, text: &str) -> Result<Value, BookingError> {
    if status == StatusCode::NO_CONTENT && text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|_| BookingError::Api {
        status: status.as_u16(),
        message: format!("Invalid JSON response from GET IN API (status {})", status.as_u16()),
        body: Value::String(text.to_string()),
    })
}

#[async_trait]
impl BookingApi for GetInClient {
    async fn list_units(&self, query: &UnitQuery) -> Result<UnitPage, BookingError> {
        let body = self.request(Method::GET, "/units", &query.query_pairs(), None).await?;
        UnitPage::from_response(body)
    }

    async fn list_availability(&self, query: &AvailabilityQuery) -> Result<Value, BookingError> {
        self.request(Method::GET, "/schedules/units", &query.query_pairs(), None).await
    }

    async fn unit_availability(
        &self,
        unit_id: &str,
        query: &AvailabilityQuery,
    ) -> Result<Value, BookingError> {
        let path = format!("/schedules/units/{unit_id}");
        self.request(Method::GET, &path, &query.query_pairs(), None).await
    }

    async fn create_reservation(&self, payload: &ReservationPayload) -> Result<Value, BookingError> {
        self.request(Method::POST, "/reservations", &[], Some(payload)).await
    }

    async fn delete_reservation(
        &self,
        reservation_id: &str,
        payload: &ReservationPayload,
    ) -> Result<Value, BookingError> {
        let path = format!("/reservations/{reservation_id}");
        self.request(Method::DELETE, &path, &[], Some(payload)).await
    }

    async fn list_reservations(
        &self,
        filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        let body = self.request(Method::GET, "/reservations", &filters.query_pairs(), None).await?;
        ReservationPage::from_response(body)
    }

    async fn next_reservations(
        &self,
        filters: &ReservationFilters,
    ) -> Result<ReservationPage, BookingError> {
        let body = self
            .request(Method::GET, "/reservations/next", &filters.next_query_pairs(), None)
            .await?;
        Ok(ReservationPage::from_next_response(body))
    }
}
