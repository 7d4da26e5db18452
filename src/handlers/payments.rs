use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Appointment;
use crate::services::booking::{BookingOrchestrator, PaymentRedirect};
use crate::services::payments;
use crate::services::slots::{self, ConsultantRef};
use crate::state::AppState;

// POST /payment-intents
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    #[serde(alias = "amount")]
    pub amount_minor_units: Option<serde_json::Number>,
    pub consultant_username: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    client_secret: String,
}

pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    let (amount, consultant_username) = match (body.amount_minor_units, body.consultant_username) {
        (Some(amount), Some(username)) if !username.trim().is_empty() => (amount, username),
        _ => {
            return Err(AppError::MissingFields(
                "amountMinorUnits, consultantUsername".into(),
            ))
        }
    };
    let amount_minor = amount
        .as_i64()
        .filter(|a| *a > 0)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "amountMinorUnits must be a positive integer, got {amount}"
            ))
        })?;

    {
        let conn = state.conn();
        slots::resolve_consultant(&conn, &ConsultantRef::Username(consultant_username.clone()))?;
    }

    let intent = payments::create_intent(
        state.payments.as_ref(),
        amount_minor,
        &state.config.payment_currency,
        &[("consultantUsername", consultant_username.as_str())],
    )
    .await?;

    tracing::info!(
        payment_intent = %intent.id,
        amount_minor,
        consultant = %consultant_username,
        "payment intent created"
    );
    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
    }))
}

// GET /payments/success
pub async fn payment_success(
    State(state): State<Arc<AppState>>,
    Query(redirect): Query<PaymentRedirect>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = BookingOrchestrator::from_state(&state).resume(redirect).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}
