//! Booking orchestration.
//!
//! A booking attempt moves through these states:
//!
//! ```text
//! SELECTED -> (free slot)   -> COMMITTING -> BOOKED
//! SELECTED -> (priced slot) -> AWAITING_PAYMENT -> COMMITTING -> BOOKED
//! any state -> FAILED
//! ```
//!
//! Every state that reads storage re-validates against fresh data; the only
//! write is the COMMITTING transaction, which either inserts the appointment
//! and consumes the pending booking, or changes nothing.

use std::sync::Mutex;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Appointment, AppointmentFilter, Availability, NewAppointment, PendingBooking, Role,
};
use crate::services::appointments;
use crate::services::conflict::{ConflictChecker, DayPolicy, Unbookable};
use crate::services::payments::{self, PaymentProcessor};
use crate::services::pending;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Selected,
    AwaitingPayment,
    Committing,
    Booked,
    Failed,
}

/// Raw booking request body; every field is optional so missing ones can be
/// reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub consultant_username: Option<String>,
    pub client_username: Option<String>,
    pub availability_id: Option<i64>,
    pub date: Option<String>,
}

/// A complete `(consultant, client, slot, date)` choice.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSelection {
    pub consultant_username: String,
    pub client_username: String,
    pub availability_id: i64,
    pub date: NaiveDate,
}

impl BookingRequest {
    pub fn into_selection(self) -> Result<BookingSelection, AppError> {
        let non_empty =
            |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let consultant_username = non_empty(self.consultant_username);
        let client_username = non_empty(self.client_username);
        let date = non_empty(self.date);

        let mut missing = vec![];
        if consultant_username.is_none() {
            missing.push("consultantUsername");
        }
        if client_username.is_none() {
            missing.push("clientUsername");
        }
        if self.availability_id.is_none() {
            missing.push("availabilityId");
        }
        if date.is_none() {
            missing.push("date");
        }

        match (consultant_username, client_username, self.availability_id, date) {
            (
                Some(consultant_username),
                Some(client_username),
                Some(availability_id),
                Some(date),
            ) => {
                let date = parse_booking_date(&date)?;
                Ok(BookingSelection {
                    consultant_username,
                    client_username,
                    availability_id,
                    date,
                })
            }
            _ => Err(AppError::MissingFields(missing.join(", "))),
        }
    }
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose calendar date is used as is.
pub fn parse_booking_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::Validation(format!("invalid date: {s}")))
}

/// What the client needs to complete payment and come back.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandoff {
    pub token: String,
    pub client_secret: String,
    pub amount_minor_units: i64,
    pub expires_at: NaiveDateTime,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    Booked(Appointment),
    AwaitingPayment(PaymentHandoff),
}

/// Parameters the payment processor appends to the success redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRedirect {
    pub token: Option<String>,
    pub payment_intent: Option<String>,
    pub redirect_status: Option<String>,
}

pub struct BookingOrchestrator<'a> {
    db: &'a Mutex<Connection>,
    payments: &'a dyn PaymentProcessor,
    policy: DayPolicy,
    currency: &'a str,
    pending_ttl: Duration,
    return_base_url: &'a str,
}

impl<'a> BookingOrchestrator<'a> {
    pub fn new(
        db: &'a Mutex<Connection>,
        payments: &'a dyn PaymentProcessor,
        policy: DayPolicy,
        currency: &'a str,
        pending_ttl: Duration,
        return_base_url: &'a str,
    ) -> Self {
        Self {
            db,
            payments,
            policy,
            currency,
            pending_ttl,
            return_base_url,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            &state.db,
            state.payments.as_ref(),
            state.config.day_policy,
            &state.config.payment_currency,
            Duration::seconds(state.config.pending_booking_ttl_secs),
            &state.config.public_base_url,
        )
    }

    /// Runs a fresh booking attempt from SELECTED. Free slots are committed
    /// right away; priced slots stop at AWAITING_PAYMENT.
    pub async fn start(&self, selection: BookingSelection) -> Result<BookingOutcome, AppError> {
        let result = self.run(&selection).await;
        if let Err(e) = &result {
            tracing::warn!(
                state = ?BookingState::Failed,
                availability_id = selection.availability_id,
                date = %selection.date,
                client = %selection.client_username,
                error = %e,
                "booking failed"
            );
        }
        result
    }

    async fn run(&self, selection: &BookingSelection) -> Result<BookingOutcome, AppError> {
        let slot = {
            let conn = self.conn();
            validate_selection(&conn, selection, self.policy, None)?
        };
        tracing::info!(
            state = ?BookingState::Selected,
            availability_id = slot.id,
            date = %selection.date,
            client = %selection.client_username,
            "slot selected"
        );

        match slot.payment_due() {
            None => Ok(BookingOutcome::Booked(self.commit(selection, None)?)),
            Some(amount_minor) => Ok(BookingOutcome::AwaitingPayment(
                self.await_payment(selection, amount_minor).await?,
            )),
        }
    }

    async fn await_payment(
        &self,
        selection: &BookingSelection,
        amount_minor: i64,
    ) -> Result<PaymentHandoff, AppError> {
        let token = Uuid::new_v4().to_string();
        let availability_id = selection.availability_id.to_string();
        let date = selection.date.to_string();
        let metadata = [
            ("consultantUsername", selection.consultant_username.as_str()),
            ("clientUsername", selection.client_username.as_str()),
            ("availabilityId", availability_id.as_str()),
            ("date", date.as_str()),
            ("bookingToken", token.as_str()),
        ];

        let intent =
            payments::create_intent(self.payments, amount_minor, self.currency, &metadata).await?;

        let now = Utc::now().naive_utc();
        let record = PendingBooking {
            token: token.clone(),
            consultant_username: selection.consultant_username.clone(),
            client_username: selection.client_username.clone(),
            availability_id: selection.availability_id,
            date: selection.date,
            amount_minor,
            payment_intent_id: intent.id.clone(),
            created_at: now,
            expires_at: now + self.pending_ttl,
        };
        {
            let mut conn = self.conn();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            validate_selection(&tx, selection, self.policy, None)?;
            pending::store(&tx, &record)?;
            tx.commit()?;
        }

        tracing::info!(
            state = ?BookingState::AwaitingPayment,
            availability_id = selection.availability_id,
            payment_intent = %intent.id,
            amount_minor,
            "awaiting payment"
        );

        Ok(PaymentHandoff {
            return_url: format!(
                "{}/payments/success?token={token}",
                self.return_base_url.trim_end_matches('/')
            ),
            token,
            client_secret: intent.client_secret,
            amount_minor_units: amount_minor,
            expires_at: record.expires_at,
        })
    }

    /// Resumes a paid booking from the processor's success redirect.
    pub async fn resume(&self, redirect: PaymentRedirect) -> Result<Appointment, AppError> {
        let token = redirect
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Resume("missing booking token".into()))?;
        Uuid::parse_str(&token).map_err(|_| AppError::Resume("malformed booking token".into()))?;

        if let Some(status) = redirect.redirect_status.as_deref() {
            if status != "succeeded" {
                return Err(AppError::Payment(format!("payment did not succeed ({status})")));
            }
        }

        let record = {
            let conn = self.conn();
            pending::load(&conn, &token)?
        };

        if let Some(intent) = redirect.payment_intent.as_deref() {
            if intent != record.payment_intent_id {
                return Err(AppError::Resume("payment does not match this booking".into()));
            }
        }

        payments::confirm_succeeded(self.payments, &record.payment_intent_id).await?;

        let selection = BookingSelection {
            consultant_username: record.consultant_username.clone(),
            client_username: record.client_username.clone(),
            availability_id: record.availability_id,
            date: record.date,
        };

        self.commit(&selection, Some(&token)).map_err(|e| {
            tracing::error!(
                state = ?BookingState::Failed,
                payment_intent = %record.payment_intent_id,
                amount_minor = record.amount_minor,
                error = %e,
                "paid booking could not be committed"
            );
            e
        })
    }

    /// COMMITTING: one IMMEDIATE transaction that re-validates, inserts the
    /// appointment and consumes the pending booking. Dropping the transaction
    /// on any error rolls everything back.
    fn commit(
        &self,
        selection: &BookingSelection,
        pending_token: Option<&str>,
    ) -> Result<Appointment, AppError> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tracing::debug!(
            state = ?BookingState::Committing,
            availability_id = selection.availability_id,
            "committing"
        );

        validate_selection(&tx, selection, self.policy, pending_token)?;

        let appointment = appointments::create(
            &tx,
            &NewAppointment {
                consultant_username: selection.consultant_username.clone(),
                client_username: selection.client_username.clone(),
                availability_id: selection.availability_id,
                date: selection.date,
            },
        )?;

        if let Some(token) = pending_token {
            if !queries::delete_pending_booking(&tx, token)? {
                return Err(AppError::Conflict("this booking was already completed".into()));
            }
        }

        tx.commit()?;

        tracing::info!(
            state = ?BookingState::Booked,
            appointment_id = appointment.id,
            availability_id = appointment.availability_id,
            date = %appointment.date,
            client = %appointment.client_username,
            "appointment booked"
        );
        Ok(appointment)
    }

    fn conn(&self) -> std::sync::MutexGuard<'a, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// SELECTED: resolves every party of the booking from storage and re-runs the
/// conflict checker. Client-side date filtering is never trusted.
///
/// Live pending bookings hold their slot like appointments do, except the one
/// identified by `holder`, which is the booking being committed.
fn validate_selection(
    conn: &Connection,
    selection: &BookingSelection,
    policy: DayPolicy,
    holder: Option<&str>,
) -> Result<Availability, AppError> {
    let consultant = queries::get_user_by_username(conn, &selection.consultant_username)?
        .filter(|u| u.role == Role::Consultant)
        .ok_or_else(|| {
            AppError::NotFound(format!("consultant {}", selection.consultant_username))
        })?;

    queries::get_user_by_username(conn, &selection.client_username)?
        .filter(|u| u.role == Role::Client)
        .ok_or_else(|| AppError::NotFound(format!("client {}", selection.client_username)))?;

    let slot = queries::get_availability(conn, selection.availability_id)?
        .filter(|a| a.consultant_id == consultant.id)
        .ok_or_else(|| AppError::NotFound(format!("availability {}", selection.availability_id)))?;

    let slots = queries::list_availabilities(conn, consultant.id, None)?;
    let booked = queries::list_appointments(
        conn,
        &AppointmentFilter {
            consultant_username: Some(consultant.username.clone()),
            client_username: None,
        },
    )?;

    ConflictChecker::new(&slots, &booked, policy)
        .check(selection.date, slot.id)
        .map_err(|reason| match reason {
            Unbookable::UnknownSlot(id) => AppError::NotFound(format!("availability {id}")),
            Unbookable::WrongWeekday { .. } => AppError::Validation(reason.to_string()),
            Unbookable::SlotTaken | Unbookable::DayTaken => {
                AppError::Conflict(reason.to_string())
            }
        })?;

    let now = Utc::now().naive_utc();
    let held = queries::list_live_pending_for_day(
        conn,
        &consultant.username,
        &selection.date,
        &now,
    )?
    .into_iter()
    .filter(|p| Some(p.token.as_str()) != holder)
    .any(|p| match policy {
        DayPolicy::OnePerConsultantDay => true,
        DayPolicy::OnePerSlotDate => p.availability_id == slot.id,
    });
    if held {
        return Err(AppError::Conflict(
            "this slot is held for another client's pending payment".into(),
        ));
    }

    Ok(slot)
}
