use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{AppointmentFilter, Availability, NewAvailability, Role};
use crate::services::appointments;
use crate::services::booking::parse_booking_date;
use crate::services::conflict::ConflictChecker;
use crate::services::slots::{self, ConsultantRef};
use crate::state::AppState;

use super::session::Session;

const MAX_BOOKABLE_RANGE_DAYS: i64 = 366;

// GET /availabilities
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub consultant_id: Option<i64>,
    pub username: Option<String>,
    pub date: Option<String>,
}

pub async fn list_availabilities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<Availability>>, AppError> {
    let by = ConsultantRef::from_parts(query.consultant_id, query.username)?;
    let booked_on = query.date.as_deref().map(parse_booking_date).transpose()?;

    let conn = state.conn();
    let consultant = slots::resolve_consultant(&conn, &by)?;
    let list = slots::list(&conn, &consultant, booked_on.as_ref(), state.config.day_policy)?;
    Ok(Json(list))
}

// POST /availabilities
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAvailabilityRequest {
    #[serde(alias = "id")]
    pub consultant_id: Option<i64>,
    pub username: Option<String>,
    pub availability: Option<NewAvailability>,
}

pub async fn create_availability(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(body): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Availability>), AppError> {
    session.require(Role::Consultant)?;
    let by = ConsultantRef::from_parts(body.consultant_id, body.username)?;
    let new = body
        .availability
        .ok_or_else(|| AppError::MissingFields("availability".into()))?;

    let conn = state.conn();
    let consultant = slots::resolve_consultant(&conn, &by)?;
    session.require_user(Role::Consultant, &consultant.username)?;

    let slot = slots::create(&conn, consultant.id, &new)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

// DELETE /availabilities
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAvailabilityRequest {
    #[serde(alias = "id")]
    pub consultant_id: Option<i64>,
    pub availability_id: Option<i64>,
}

pub async fn delete_availability(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(body): Json<DeleteAvailabilityRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require(Role::Consultant)?;
    let (consultant_id, availability_id) = match (body.consultant_id, body.availability_id) {
        (Some(c), Some(a)) => (c, a),
        (None, Some(_)) => return Err(AppError::MissingFields("consultantId".into())),
        (Some(_), None) => return Err(AppError::MissingFields("availabilityId".into())),
        (None, None) => {
            return Err(AppError::MissingFields("consultantId, availabilityId".into()))
        }
    };

    let mut conn = state.conn();
    let consultant = slots::resolve_consultant(&conn, &ConsultantRef::Id(consultant_id))?;
    session.require_user(Role::Consultant, &consultant.username)?;

    let removed = slots::delete(&mut conn, availability_id, consultant.id)?;
    Ok(Json(serde_json::json!({
        "message": "Availability deleted",
        "appointmentsDeleted": removed,
    })))
}

// GET /availabilities/bookable-dates
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookableDatesQuery {
    pub consultant_id: Option<i64>,
    pub username: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub availability_id: Option<i64>,
}

pub async fn bookable_dates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookableDatesQuery>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    let by = ConsultantRef::from_parts(query.consultant_id, query.username)?;
    let (from, to) = match (query.from.as_deref(), query.to.as_deref()) {
        (Some(from), Some(to)) => (parse_booking_date(from)?, parse_booking_date(to)?),
        _ => return Err(AppError::MissingFields("from, to".into())),
    };
    if (to - from).num_days() > MAX_BOOKABLE_RANGE_DAYS {
        return Err(AppError::Validation(format!(
            "date range may span at most {MAX_BOOKABLE_RANGE_DAYS} days"
        )));
    }

    let conn = state.conn();
    let consultant = slots::resolve_consultant(&conn, &by)?;
    let availabilities = slots::list(&conn, &consultant, None, state.config.day_policy)?;
    let booked = appointments::list(
        &conn,
        &AppointmentFilter {
            consultant_username: Some(consultant.username.clone()),
            client_username: None,
        },
    )?;

    let checker = ConflictChecker::new(&availabilities, &booked, state.config.day_policy);
    Ok(Json(checker.bookable_dates(from, to, query.availability_id)))
}
