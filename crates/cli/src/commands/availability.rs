use mesa_agent::sectors::{extract_available_sectors, AvailableSector};
use mesa_booking::{AvailabilityQuery, BookingApi, GetInClient};
use mesa_core::config::LoadOptions;
use mesa_core::{normalize_date, normalize_time};
use serde::Serialize;
use serde_json::Value;

use crate::commands::{
    block_on, load_config, CommandResult, EXIT_BACKEND, EXIT_CONFIG, EXIT_INVALID_INPUT,
};

const COMMAND: &str = "availability";

/// Raw command-line input, before normalization.
#[derive(Clone, Debug, Default)]
pub struct AvailabilityArgs {
    pub date: String,
    pub time: String,
    pub people: u32,
    pub unit_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AvailabilityReport {
    unit_id: Option<String>,
    date: String,
    hour: String,
    people: u32,
    available_sectors: Vec<AvailableSector>,
    has_exact_slots: bool,
    response: Value,
}

pub fn run(options: &LoadOptions, args: &AvailabilityArgs) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let client = match GetInClient::new(&config.booking) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(COMMAND, "booking_setup", error.to_string(), EXIT_CONFIG)
        }
    };
    let unit_id = args.unit_id.clone().or_else(|| config.booking.default_unit_id.clone());
    let args = AvailabilityArgs { unit_id, ..args.clone() };

    block_on(COMMAND, check(&client, &args)).unwrap_or_else(|failure| failure)
}

/// Queries one unit when a unit id is known, every unit otherwise.
pub async fn check(booking: &dyn BookingApi, args: &AvailabilityArgs) -> CommandResult {
    let date = match normalize_date(&args.date) {
        Ok(date) => date,
        Err(error) => return invalid_input(format!("--date: {error}")),
    };
    let hour = match normalize_time(&args.time) {
        Ok(hour) => hour,
        Err(error) => return invalid_input(format!("--time: {error}")),
    };
    if args.people == 0 {
        return invalid_input("--people must be greater than zero".to_string());
    }

    let query = AvailabilityQuery { date: date.clone(), hour: hour.clone(), people: args.people };
    let outcome = match args.unit_id.as_deref().filter(|unit| !unit.trim().is_empty()) {
        Some(unit_id) => booking.unit_availability(unit_id, &query).await,
        None => booking.list_availability(&query).await,
    };

    match outcome {
        Ok(response) => {
            let has_exact_slots =
                response.get("data").and_then(Value::as_array).is_some_and(|data| !data.is_empty());
            let report = AvailabilityReport {
                unit_id: args.unit_id.clone(),
                date,
                hour,
                people: args.people,
                available_sectors: extract_available_sectors(&response),
                has_exact_slots,
                response,
            };
            CommandResult::json(COMMAND, &report)
        }
        Err(error) => CommandResult::failure(COMMAND, error.kind(), error.to_string(), EXIT_BACKEND),
    }
}

fn invalid_input(message: String) -> CommandResult {
    CommandResult::failure(COMMAND, "invalid_argument", message, EXIT_INVALID_INPUT)
}
