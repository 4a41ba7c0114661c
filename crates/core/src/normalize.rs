//! Date and time normalization for the Portuguese phrasings guests use.
//!
//! Dates resolve to `YYYY-MM-DD`, times to `HH:MM`. Relative terms ("hoje",
//! "amanhã") resolve against a caller-supplied reference date so the parsing
//! stays deterministic under test.

use chrono::{Duration, Local, NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("empty input")]
    EmptyInput,
    #[error("unsupported format: `{0}`")]
    UnsupportedFormat(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("invalid time `{0}` (expected HH:MM)")]
    InvalidTime(String),
}

const RELATIVE_DAYS: [(&str, i64); 5] = [
    ("hoje", 0),
    ("amanhã", 1),
    ("amanha", 1),
    ("depois de amanhã", 2),
    ("depois de amanha", 2),
];

const DAY_PARTS: [(&str, &str); 16] = [
    ("almoço", "12:00"),
    ("almoco", "12:00"),
    ("no almoço", "12:00"),
    ("no almoco", "12:00"),
    ("jantar", "20:00"),
    ("no jantar", "20:00"),
    ("de manhã", "09:00"),
    ("de manha", "09:00"),
    ("manhã", "09:00"),
    ("manha", "09:00"),
    ("à tarde", "15:00"),
    ("a tarde", "15:00"),
    ("tarde", "15:00"),
    ("à noite", "20:00"),
    ("a noite", "20:00"),
    ("noite", "20:00"),
];

const TIME_PREFIXES: [&str; 3] = ["às ", "as ", "a "];

/// Normalizes a date expression against the local calendar date.
pub fn normalize_date(text: &str) -> Result<String, NormalizeError> {
    normalize_date_on(text, Local::now().date_naive())
}

pub fn normalize_date_on(text: &str, today: NaiveDate) -> Result<String, NormalizeError> {
    let cleaned = collapse_whitespace(&text.trim().to_lowercase());
    if cleaned.is_empty() {
        return Err(NormalizeError::UnsupportedFormat(text.to_string()));
    }

    if let Some((_, offset)) = RELATIVE_DAYS.iter().find(|(term, _)| *term == cleaned) {
        return Ok(format_date(today + Duration::days(*offset)));
    }

    let (year, month, day) = parse_iso_parts(&cleaned)
        .or_else(|| parse_slash_parts(&cleaned))
        .ok_or_else(|| NormalizeError::UnsupportedFormat(text.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .map(format_date)
        .ok_or_else(|| NormalizeError::InvalidValue(format!("`{cleaned}` is not a calendar date")))
}

pub fn normalize_time(text: &str) -> Result<String, NormalizeError> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(NormalizeError::EmptyInput);
    }

    if let Some((_, canonical)) = DAY_PARTS.iter().find(|(term, _)| *term == lowered) {
        return Ok((*canonical).to_string());
    }

    let mut rest = lowered.as_str();
    for prefix in TIME_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.trim_start();
            break;
        }
    }

    let cleaned: String =
        rest.chars().filter(|ch| ch.is_ascii_digit() || *ch == 'h' || *ch == ':').collect();
    let cleaned = cleaned.replace("hs", "h").replace('h', ":");

    let (hour, minute) = match cleaned.split_once(':') {
        // "20h" collapses to "20:", which reads as the top of the hour.
        Some((hour, "")) => (parse_digits(hour, 1, 2), Some(0)),
        Some((hour, minute)) => (parse_digits(hour, 1, 2), parse_digits(minute, 1, 2)),
        None => (parse_digits(&cleaned, 1, 2), Some(0)),
    };
    let (Some(hour), Some(minute)) = (hour, minute) else {
        return Err(NormalizeError::UnsupportedFormat(text.to_string()));
    };

    if hour > 23 || minute > 59 {
        return Err(NormalizeError::InvalidValue(format!("{hour}:{minute} is out of range")));
    }

    Ok(format!("{hour:02}:{minute:02}"))
}

/// Joins a canonical date and time into `YYYY-MM-DDTHH:MM:00`.
pub fn combine_to_iso(date: &str, time: &str) -> Result<String, NormalizeError> {
    let parsed_date = (date.len() == 10)
        .then(|| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .flatten()
        .ok_or_else(|| NormalizeError::InvalidDate(date.to_string()))?;
    let parsed_time = (time.len() == 5)
        .then(|| NaiveTime::parse_from_str(time, "%H:%M").ok())
        .flatten()
        .ok_or_else(|| NormalizeError::InvalidTime(time.to_string()))?;

    Ok(format!("{}T{}:00", format_date(parsed_date), parsed_time.format("%H:%M")))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_iso_parts(value: &str) -> Option<(i32, u32, u32)> {
    let mut parts = value.split('-');
    let year = parts.next().filter(|part| part.len() == 4)?;
    let month = parts.next().filter(|part| part.len() == 2)?;
    let day = parts.next().filter(|part| part.len() == 2)?;
    if parts.next().is_some() {
        return None;
    }
    Some((parse_digits(year, 4, 4)? as i32, parse_digits(month, 2, 2)?, parse_digits(day, 2, 2)?))
}

fn parse_slash_parts(value: &str) -> Option<(i32, u32, u32)> {
    let mut parts = value.split('/');
    let day = parse_digits(parts.next()?, 1, 2)?;
    let month = parse_digits(parts.next()?, 1, 2)?;
    let year = parse_digits(parts.next()?, 4, 4)?;
    if parts.next().is_some() {
        return None;
    }
    Some((year as i32, month, day))
}

fn parse_digits(value: &str, min_len: usize, max_len: usize) -> Option<u32> {
    let valid_len = (min_len..=max_len).contains(&value.len());
    if !valid_len || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
