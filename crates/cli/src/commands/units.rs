use mesa_booking::{BookingApi, GetInClient, UnitQuery};
use mesa_core::config::LoadOptions;
use serde_json::json;

use crate::commands::{block_on, load_config, CommandResult, EXIT_BACKEND, EXIT_CONFIG};

const COMMAND: &str = "units";

pub fn run(options: &LoadOptions, search: Option<&str>) -> CommandResult {
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

    block_on(COMMAND, list(&client, search)).unwrap_or_else(|failure| failure)
}

pub async fn list(booking: &dyn BookingApi, search: Option<&str>) -> CommandResult {
    let query = UnitQuery { search: search.map(str::to_string), ..UnitQuery::default() };
    match booking.list_units(&query).await {
        Ok(page) => {
            CommandResult::json(COMMAND, &json!({ "units": page.units, "pagination": page.pagination }))
        }
        Err(error) => CommandResult::failure(COMMAND, error.kind(), error.to_string(), EXIT_BACKEND),
    }
}
