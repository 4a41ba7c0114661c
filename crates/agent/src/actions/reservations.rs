use mesa_booking::models::scalar_to_string;
use mesa_booking::{ReservationFilters, ReservationPayload};
use serde_json::{json, Value};
use tracing::info;

use super::{
    headcount, normalized_time, ActionContext, ActionError, ActionKind, ActionResult, ErrorCode,
};
use crate::sectors::resolve_sector;
use crate::state::Params;

mod messages {
    pub const CREATE_MISSING: &str = "Faltam algumas informações para criar a reserva: ";
    pub const CREATE_INVALID_PEOPLE: &str = "O número de pessoas informado é inválido.";
    pub const CREATE_INVALID_TABLE: &str = "A capacidade de mesa (table_people) é inválida.";
    pub const CREATE_API: &str = "Falha ao criar a reserva na GET IN API.";
    pub const CREATE_UNEXPECTED: &str = "Ocorreu um erro inesperado ao criar a reserva.";

    pub const NEXT_MISSING: &str =
        "Para localizar sua próxima reserva, preciso de um telefone ou e-mail associado às reservas.";
    pub const NEXT_API: &str = "Falha ao consultar a próxima reserva na GET IN API.";
    pub const NEXT_UNEXPECTED: &str = "Ocorreu um erro inesperado ao consultar sua próxima reserva.";

    pub const LIST_MISSING: &str =
        "Para consultar reservas, preciso de pelo menos uma informação como telefone, e-mail, nome ou data.";
    pub const LIST_API: &str = "Falha ao consultar reservas na GET IN API.";
    pub const LIST_UNEXPECTED: &str = "Ocorreu um erro inesperado ao consultar reservas.";

    pub const CANCEL_MISSING: &str =
        "Para cancelar sua reserva, preciso do telefone ou e-mail usado ao reservar.";
    pub const CANCEL_NOT_FOUND: &str = "Não encontrei nenhuma reserva ativa com esses dados.";
    pub const CANCEL_AMBIGUOUS: &str =
        "Encontrei mais de uma reserva com esses dados. Qual delas você deseja cancelar?";
    pub const CANCEL_API: &str = "Falha ao cancelar a reserva na GET IN API.";
    pub const CANCEL_UNEXPECTED: &str = "Ocorreu um erro inesperado ao cancelar a reserva.";
}

fn owned(value: &Option<String>) -> Option<String> {
    Params::text(value).map(str::to_string)
}

/// Creates a reservation once every required field, including a resolved
/// sector, is known.
pub async fn create_reservation(context: ActionContext<'_>, params: &Params) -> ActionResult {
    let unit_id = context.unit_id(params);
    let date = owned(&params.date);
    let time = normalized_time(params.time.as_deref());
    let party_size = params.party_size.filter(|size| *size != 0);
    let name = owned(&params.name);
    let phone = owned(&params.phone);
    let email = owned(&params.email);
    let sector = resolve_sector(params);
    let table_people = params.table_people.filter(|size| *size != 0).or(party_size);

    let request = json!({
        "date": date,
        "time": time,
        "party_size": party_size,
        "name": name,
        "phone": phone,
        "email": email,
        "unit_id": unit_id,
        "sector_id": sector.sector_id,
        "table_people": table_people,
        "info": sector.notes,
        "discount": params.discount,
        "custom_fields": params.custom_fields,
        "highlighted": params.highlighted,
    });

    let required = [
        ("unit_id", unit_id.is_some()),
        ("sector_id", sector.sector_id.is_some()),
        ("date", date.is_some()),
        ("time", time.is_some()),
        ("party_size", party_size.is_some()),
        ("name", name.is_some()),
        ("phone", phone.is_some()),
        ("email", email.is_some()),
    ];
    let missing: Vec<&str> =
        required.iter().filter(|(_, present)| !present).map(|(field, _)| *field).collect();

    let (
        Some(unit_id),
        Some(sector_id),
        Some(date),
        Some(time),
        Some(party_size),
        Some(name),
        Some(mobile),
        Some(email),
    ) = (unit_id, sector.sector_id, date, time, party_size, name, phone, email)
    else {
        return ActionResult::failure(
            ActionKind::CreateReservation,
            request,
            ActionError::missing_fields(ErrorCode::MissingParams, messages::CREATE_MISSING, &missing),
        );
    };

    let Some(people) = headcount(party_size) else {
        return ActionResult::failure(
            ActionKind::CreateReservation,
            request,
            ActionError::new(
                ErrorCode::InvalidParam,
                messages::CREATE_INVALID_PEOPLE,
                json!({ "party_size": party_size }),
            ),
        );
    };
    let Some(table_people) = table_people.and_then(headcount) else {
        return ActionResult::failure(
            ActionKind::CreateReservation,
            request,
            ActionError::new(
                ErrorCode::InvalidParam,
                messages::CREATE_INVALID_TABLE,
                json!({ "table_people": table_people }),
            ),
        );
    };

    let payload = ReservationPayload {
        unit_id,
        sector_id,
        name,
        mobile,
        email,
        people,
        table_people,
        date,
        time,
        info: sector.notes,
        discount: params.discount,
        custom_fields: params.custom_fields.clone(),
        highlighted: params.highlighted,
    };

    match context.booking.create_reservation(&payload).await {
        Ok(response) => {
            info!(
                event_name = "agent.action.reservation_created",
                unit_id = %payload.unit_id,
                sector_id = %payload.sector_id,
                people = payload.people,
                "reservation created"
            );
            ActionResult::success(ActionKind::CreateReservation, request, response)
        }
        Err(error) => ActionResult::failure(
            ActionKind::CreateReservation,
            request,
            ActionError::from_booking(&error, messages::CREATE_API, messages::CREATE_UNEXPECTED),
        ),
    }
}

/// Looks up the guest's upcoming reservation by phone or e-mail.
pub async fn view_next_reservation(context: ActionContext<'_>, params: &Params) -> ActionResult {
    let filters = ReservationFilters {
        unit_id: context.unit_id(params),
        mobile: owned(&params.phone),
        email: owned(&params.email),
        start_date: owned(&params.start_date),
        end_date: owned(&params.end_date),
        status: owned(&params.status),
        ..ReservationFilters::default()
    };
    let request = json!({
        "phone": filters.mobile,
        "email": filters.email,
        "unit_id": filters.unit_id,
        "start_date": filters.start_date,
        "end_date": filters.end_date,
        "status": filters.status,
    });

    if filters.mobile.is_none() && filters.email.is_none() {
        return ActionResult::failure(
            ActionKind::ViewNextReservation,
            request,
            ActionError::new(
                ErrorCode::MissingParams,
                messages::NEXT_MISSING,
                json!({ "required_one_of": ["phone", "email"] }),
            ),
        );
    }

    match context.booking.next_reservations(&filters).await {
        Ok(page) => ActionResult::success(ActionKind::ViewNextReservation, request, page.raw),
        Err(error) => ActionResult::failure(
            ActionKind::ViewNextReservation,
            request,
            ActionError::from_booking(&error, messages::NEXT_API, messages::NEXT_UNEXPECTED),
        ),
    }
}

pub async fn list_reservations(context: ActionContext<'_>, params: &Params) -> ActionResult {
    let filters = ReservationFilters {
        unit_id: context.unit_id(params),
        search: owned(&params.search),
        mobile: owned(&params.phone),
        email: owned(&params.email),
        date: owned(&params.date),
        start_date: owned(&params.start_date),
        end_date: owned(&params.end_date),
        status: owned(&params.status),
        sector_id: owned(&params.sector_id),
        sort: owned(&params.sort),
        page: params.page,
    };
    let request = json!({
        "unit_id": filters.unit_id,
        "search": filters.search,
        "phone": filters.mobile,
        "email": filters.email,
        "date": filters.date,
        "start_date": filters.start_date,
        "end_date": filters.end_date,
        "status": filters.status,
        "sector_id": filters.sector_id,
        "sort": filters.sort,
        "page": filters.page,
    });

    let identifying = [
        &filters.mobile,
        &filters.email,
        &filters.search,
        &filters.date,
        &filters.start_date,
        &filters.end_date,
    ];
    if identifying.iter().all(|filter| filter.is_none()) {
        return ActionResult::failure(
            ActionKind::ListReservations,
            request,
            ActionError::new(
                ErrorCode::MissingFilters,
                messages::LIST_MISSING,
                json!({
                    "required_one_of": ["phone", "email", "search", "date", "start_date", "end_date"]
                }),
            ),
        );
    }

    match context.booking.list_reservations(&filters).await {
        Ok(page) => ActionResult::success(ActionKind::ListReservations, request, page.raw),
        Err(error) => ActionResult::failure(
            ActionKind::ListReservations,
            request,
            ActionError::from_booking(&error, messages::LIST_API, messages::LIST_UNEXPECTED),
        ),
    }
}

/// Cancels exactly one active reservation found by the guest's contact.
///
/// The reservation is listed first, narrowed by date and id when known, and
/// only deleted when a single candidate remains.
pub async fn cancel_reservation(context: ActionContext<'_>, params: &Params) -> ActionResult {
    let filters = ReservationFilters {
        unit_id: context.unit_id(params),
        mobile: owned(&params.phone),
        email: owned(&params.email),
        date: owned(&params.date),
        ..ReservationFilters::default()
    };
    let reservation_id = owned(&params.reservation_id);
    let request = json!({
        "unit_id": filters.unit_id,
        "phone": filters.mobile,
        "email": filters.email,
        "date": filters.date,
        "reservation_id": reservation_id,
    });

    if filters.mobile.is_none() && filters.email.is_none() {
        return ActionResult::failure(
            ActionKind::CancelReservation,
            request,
            ActionError::new(
                ErrorCode::MissingParams,
                messages::CANCEL_MISSING,
                json!({ "required_one_of": ["phone", "email"] }),
            ),
        );
    }

    let page = match context.booking.list_reservations(&filters).await {
        Ok(page) => page,
        Err(error) => {
            return ActionResult::failure(
                ActionKind::CancelReservation,
                request,
                ActionError::from_booking(&error, messages::CANCEL_API, messages::CANCEL_UNEXPECTED),
            );
        }
    };

    let candidates: Vec<&Value> = page
        .reservations
        .iter()
        .filter(|reservation| reservation_field(reservation, &["/id"]).is_some())
        .filter(|reservation| !is_canceled(reservation))
        .filter(|reservation| match &reservation_id {
            Some(wanted) => reservation_field(reservation, &["/id"]).as_deref() == Some(wanted),
            None => true,
        })
        .collect();

    let target = match candidates.as_slice() {
        [] => {
            return ActionResult::failure(
                ActionKind::CancelReservation,
                request,
                ActionError::new(ErrorCode::NotFound, messages::CANCEL_NOT_FOUND, Value::Null),
            );
        }
        [only] => *only,
        several => {
            let ids: Vec<String> = several
                .iter()
                .filter_map(|reservation| reservation_field(reservation, &["/id"]))
                .collect();
            return ActionResult::failure(
                ActionKind::CancelReservation,
                request,
                ActionError::new(
                    ErrorCode::AmbiguousReservation,
                    messages::CANCEL_AMBIGUOUS,
                    json!({ "candidates": ids }),
                ),
            );
        }
    };

    let Some(target_id) = reservation_field(target, &["/id"]) else {
        return ActionResult::failure(
            ActionKind::CancelReservation,
            request,
            ActionError::new(ErrorCode::NotFound, messages::CANCEL_NOT_FOUND, Value::Null),
        );
    };
    let payload = echo_payload(target, params, filters.unit_id.as_deref());

    match context.booking.delete_reservation(&target_id, &payload).await {
        Ok(response) => {
            info!(
                event_name = "agent.action.reservation_canceled",
                reservation_id = %target_id,
                "reservation canceled"
            );
            ActionResult::success(
                ActionKind::CancelReservation,
                request,
                json!({ "reservation_id": target_id, "reservation": target, "result": response }),
            )
        }
        Err(error) => ActionResult::failure(
            ActionKind::CancelReservation,
            request,
            ActionError::from_booking(&error, messages::CANCEL_API, messages::CANCEL_UNEXPECTED),
        ),
    }
}

fn reservation_field(reservation: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| reservation.pointer(pointer))
        .map(scalar_to_string)
        .find(|text| !text.trim().is_empty())
}

fn is_canceled(reservation: &Value) -> bool {
    reservation_field(reservation, &["/status"])
        .is_some_and(|status| status.to_lowercase().starts_with("cancel"))
}

/// Delete requests repeat the reservation's own fields, falling back to what
/// the guest told us.
fn echo_payload(reservation: &Value, params: &Params, unit_id: Option<&str>) -> ReservationPayload {
    let text = |pointers: &[&str], fallback: Option<&str>| {
        reservation_field(reservation, pointers)
            .or_else(|| fallback.map(str::to_string))
            .unwrap_or_default()
    };
    let count = |pointers: &[&str]| {
        reservation_field(reservation, pointers)
            .and_then(|value| value.parse::<u32>().ok())
            .or_else(|| params.party_size.and_then(headcount))
            .unwrap_or_default()
    };

    ReservationPayload {
        unit_id: text(&["/unit_id", "/unit/id"], unit_id),
        sector_id: text(&["/sector_id", "/sector/id"], Params::text(&params.sector_id)),
        name: text(&["/name", "/customer/name"], Params::text(&params.name)),
        mobile: text(&["/mobile", "/customer/mobile"], Params::text(&params.phone)),
        email: text(&["/email", "/customer/email"], Params::text(&params.email)),
        people: count(&["/people"]),
        table_people: count(&["/table_people", "/people"]),
        date: text(&["/date"], Params::text(&params.date)),
        time: text(&["/time", "/hour"], Params::text(&params.time)),
        info: reservation_field(reservation, &["/info"]),
        discount: None,
        custom_fields: None,
        highlighted: None,
    }
}
