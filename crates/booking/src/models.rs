use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BookingError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitQuery {
    pub search: Option<String>,
    /// Latitude and longitude, in the backend's `lat,lng` format.
    pub coordinates: Option<String>,
    pub distance: Option<u32>,
    pub no_show_enabled: Option<bool>,
}

impl UnitQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_text(&mut pairs, "search", self.search.as_deref());
        push_text(&mut pairs, "coordinates", self.coordinates.as_deref());
        if let Some(distance) = self.distance {
            pairs.push(("distance", distance.to_string()));
        }
        if let Some(enabled) = self.no_show_enabled {
            pairs.push(("no_show_enabled", if enabled { "1" } else { "0" }.to_string()));
        }
        pairs
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub date: String,
    pub hour: String,
    pub people: u32,
}

impl AvailabilityQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("date", self.date.clone()),
            ("hour", self.hour.clone()),
            ("people", self.people.to_string()),
        ]
    }
}

/// Body for `POST /reservations` and `DELETE /reservations/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationPayload {
    pub unit_id: String,
    pub sector_id: String,
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub people: u32,
    pub table_people: u32,
    pub date: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
}

/// Filters shared by `GET /reservations` and `GET /reservations/next`.
///
/// `/reservations/next` ignores `search`, `date` and `sector_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReservationFilters {
    pub unit_id: Option<String>,
    pub search: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub sector_id: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

impl ReservationFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_text(&mut pairs, "unit_id", self.unit_id.as_deref());
        push_text(&mut pairs, "search", self.search.as_deref());
        push_text(&mut pairs, "mobile", self.mobile.as_deref());
        push_text(&mut pairs, "email", self.email.as_deref());
        push_text(&mut pairs, "date", self.date.as_deref());
        push_text(&mut pairs, "start_date", self.start_date.as_deref());
        push_text(&mut pairs, "end_date", self.end_date.as_deref());
        push_text(&mut pairs, "status", self.status.as_deref());
        push_text(&mut pairs, "sector_id", self.sector_id.as_deref());
        push_text(&mut pairs, "sort", self.sort.as_deref());
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }

    pub fn next_query_pairs(&self) -> Vec<(&'static str, String)> {
        self.query_pairs()
            .into_iter()
            .filter(|(key, _)| !matches!(*key, "search" | "date" | "sector_id"))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub city_slug: Option<String>,
    pub slug: Option<String>,
    pub full_address: Option<String>,
    pub timezone: Option<String>,
    pub telephone: Option<String>,
}

impl Unit {
    pub fn from_value(raw: &Value) -> Self {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            id: raw.get("id").map(scalar_to_string).unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            city_slug: text("city_slug"),
            slug: text("slug"),
            full_address: text("full_address"),
            timezone: text("timezone"),
            telephone: text("telephone"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitPage {
    pub units: Vec<Unit>,
    pub pagination: Value,
    pub raw: Value,
}

impl UnitPage {
    pub fn from_response(raw: Value) -> Result<Self, BookingError> {
        let units = match raw.get("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(Unit::from_value).collect(),
            Some(_) => {
                return Err(BookingError::Decode("/units `data` is not a list".to_string()));
            }
        };
        let pagination = raw.get("pagination").cloned().unwrap_or(Value::Null);
        Ok(Self { units, pagination, raw })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReservationPage {
    pub reservations: Vec<Value>,
    pub pagination: Value,
    pub raw: Value,
}

impl ReservationPage {
    /// A 2xx body whose `data` is not a list is reported as an API error.
    pub fn from_response(raw: Value) -> Result<Self, BookingError> {
        let reservations = match raw.get("data") {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(BookingError::Api {
                    status: 200,
                    message: "Unexpected /reservations response format: 'data' is not a list."
                        .to_string(),
                    body: raw,
                });
            }
        };
        let pagination = raw.get("pagination").cloned().unwrap_or(Value::Null);
        Ok(Self { reservations, pagination, raw })
    }

    /// `/reservations/next` bodies are passed through whatever their shape:
    /// `data` may be a list, a single reservation, or `null`.
    pub fn from_next_response(raw: Value) -> Self {
        let reservations = match raw.get("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        };
        let pagination = raw.get("pagination").cloned().unwrap_or(Value::Null);
        Self { reservations, pagination, raw }
    }
}

/// Renders ids that the backend sends either as strings or as numbers.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn push_text(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
        pairs.push((key, value.to_string()));
    }
}
