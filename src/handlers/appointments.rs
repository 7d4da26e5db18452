use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentFilter, Role};
use crate::services::appointments;
use crate::services::booking::{BookingOrchestrator, BookingOutcome, BookingRequest};
use crate::state::AppState;

use super::session::Session;

// GET /appointments
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentsQuery {
    pub username: Option<String>,
    pub consultant_username: Option<String>,
    pub client_username: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let conn = state.conn();
    let list = match query.username.filter(|u| !u.is_empty()) {
        Some(username) => appointments::list_for_user(&conn, &username)?,
        None => appointments::list(
            &conn,
            &AppointmentFilter {
                consultant_username: query.consultant_username,
                client_username: query.client_username,
            },
        )?,
    };
    Ok(Json(list))
}

// POST /appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(body): Json<BookingRequest>,
) -> Result<Response, AppError> {
    let selection = body.into_selection()?;
    session.require_user(Role::Client, &selection.client_username)?;

    let outcome = BookingOrchestrator::from_state(&state).start(selection).await?;

    Ok(match outcome {
        BookingOutcome::Booked(appointment) => {
            (StatusCode::CREATED, Json(appointment)).into_response()
        }
        BookingOutcome::AwaitingPayment(handoff) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "awaiting_payment",
                "payment": handoff,
            })),
        )
            .into_response(),
    })
}
