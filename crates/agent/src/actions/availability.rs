use mesa_booking::AvailabilityQuery;
use serde_json::{json, Value};
use tracing::info;

use super::{
    headcount, normalized_time, ActionContext, ActionDetail, ActionError, ActionKind,
    ActionOutcome, ActionResult, ErrorCode,
};
use crate::sectors::extract_available_sectors;
use crate::state::Params;

const MISSING_MESSAGE: &str = "Parâmetros obrigatórios ausentes para checar disponibilidade: ";
const INVALID_PEOPLE_MESSAGE: &str = "O número de pessoas informado é inválido.";
const API_MESSAGE: &str = "Falha ao consultar disponibilidade na GET IN API.";
const UNEXPECTED_MESSAGE: &str = "Ocorreu um erro inesperado ao consultar disponibilidade.";

/// Checks a unit's schedule for the requested date, time and party size.
pub async fn check_availability(context: ActionContext<'_>, params: &Params) -> ActionResult {
    let unit_id = context.unit_id(params);
    let date = Params::text(&params.date).map(str::to_string);
    let time = normalized_time(params.time.as_deref());
    let party_size = params.party_size;

    let request = json!({
        "unit_id": unit_id,
        "date": date,
        "time": time,
        "party_size": party_size,
    });

    let mut missing = Vec::new();
    if unit_id.is_none() {
        missing.push("unit_id");
    }
    if date.is_none() {
        missing.push("date");
    }
    if time.is_none() {
        missing.push("time");
    }
    let party_size = party_size.filter(|size| *size != 0);
    if party_size.is_none() {
        missing.push("party_size");
    }
    let (Some(unit_id), Some(date), Some(time), Some(party_size)) = (unit_id, date, time, party_size)
    else {
        return ActionResult::failure(
            ActionKind::Availability,
            request,
            ActionError::missing_fields(ErrorCode::MissingParams, MISSING_MESSAGE, &missing),
        );
    };

    let Some(people) = headcount(party_size) else {
        return ActionResult::failure(
            ActionKind::Availability,
            request,
            ActionError::new(
                ErrorCode::InvalidParam,
                INVALID_PEOPLE_MESSAGE,
                json!({ "party_size": party_size }),
            ),
        );
    };

    let query = AvailabilityQuery { date, hour: time, people };
    match context.booking.unit_availability(&unit_id, &query).await {
        Ok(response) => {
            let available_sectors = extract_available_sectors(&response);
            let has_exact_slots =
                response.get("data").and_then(Value::as_array).is_some_and(|data| !data.is_empty());
            info!(
                event_name = "agent.action.availability",
                unit_id = %unit_id,
                sectors = available_sectors.len(),
                has_exact_slots,
                "availability checked"
            );
            ActionResult {
                kind: ActionKind::Availability,
                request,
                outcome: ActionOutcome::Success {
                    response: Some(response),
                    detail: ActionDetail::Availability { available_sectors, has_exact_slots },
                },
            }
        }
        Err(error) => ActionResult::failure(
            ActionKind::Availability,
            request,
            ActionError::from_booking(&error, API_MESSAGE, UNEXPECTED_MESSAGE),
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::check_availability;
    use crate::actions::{ActionContext, ErrorCode};
    use crate::state::Params;
    use crate::test_support::{FakeBooking, Reply};

    fn complete_params() -> Params {
        Params {
            date: Some("2025-03-10".to_string()),
            time: Some("20h".to_string()),
            party_size: Some(2),
            ..Params::default()
        }
    }

    #[tokio::test]
    async fn missing_fields_are_listed_in_order() {
        let backend = FakeBooking::default();
        let context = ActionContext { booking: &backend, default_unit_id: None };
        let params = Params { party_size: Some(0), ..Params::default() };

        let result = check_availability(context, &params).await;
        let error = result.error().expect("missing params");

        assert_eq!(error.code, ErrorCode::MissingParams);
        assert_eq!(error.details["missing_fields"], json!(["unit_id", "date", "time", "party_size"]));
        assert!(error.message.ends_with("unit_id, date, time, party_size"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn default_unit_and_normalized_time_reach_the_backend() {
        let backend = FakeBooking::default().reply(
            "unit_availability",
            Reply::Body(json!({
                "success": true,
                "data": [{"hour": "20:00", "sector_id": "S1", "sector_name": "Salão"}]
            })),
        );
        let context = ActionContext { booking: &backend, default_unit_id: Some("VPzzDDPQ") };

        let result = check_availability(context, &complete_params()).await;

        assert!(result.ok());
        assert_eq!(result.available_sectors().len(), 1);
        assert_eq!(result.to_json()["has_exact_slots"], true);
        assert_eq!(result.request["time"], "20:00");
        let calls = backend.calls();
        assert_eq!(calls[0].target.as_deref(), Some("VPzzDDPQ"));
        assert_eq!(calls[0].input, json!({"date": "2025-03-10", "hour": "20:00", "people": "2"}));
    }

    #[tokio::test]
    async fn empty_schedule_is_still_a_successful_check() {
        let backend = FakeBooking::default();
        let context = ActionContext { booking: &backend, default_unit_id: Some("U1") };

        let result = check_availability(context, &complete_params()).await;

        assert!(result.ok());
        assert!(result.available_sectors().is_empty());
        assert_eq!(result.to_json()["has_exact_slots"], false);
    }

    #[tokio::test]
    async fn negative_party_size_is_invalid() {
        let backend = FakeBooking::default();
        let context = ActionContext { booking: &backend, default_unit_id: Some("U1") };
        let params = Params { party_size: Some(-3), ..complete_params() };

        let result = check_availability(context, &params).await;
        assert_eq!(result.error().map(|e| e.code), Some(ErrorCode::InvalidParam));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn backend_rejection_is_an_api_error() {
        let backend = FakeBooking::default()
            .reply("unit_availability", Reply::Status(500, json!({"message": "indisponível"})));
        let context = ActionContext { booking: &backend, default_unit_id: Some("U1") };

        let result = check_availability(context, &complete_params()).await;
        let error = result.error().expect("api error");

        assert_eq!(error.code, ErrorCode::ApiError);
        assert_eq!(error.message, "Falha ao consultar disponibilidade na GET IN API.");
        assert_eq!(error.details["status_code"], 500);
    }
}
