use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentFilter, NewAppointment};

pub fn list(conn: &Connection, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppError> {
    Ok(queries::list_appointments(conn, filter)?)
}

pub fn list_for_user(conn: &Connection, username: &str) -> Result<Vec<Appointment>, AppError> {
    Ok(queries::list_appointments_for_user(conn, username)?)
}

/// Inserts an appointment. The `(availability_id, date)` UNIQUE constraint is
/// the conflict check; a violation surfaces as [`AppError::Conflict`].
pub fn create(conn: &Connection, new: &NewAppointment) -> Result<Appointment, AppError> {
    queries::insert_appointment(conn, new).map_err(|e| {
        if queries::is_unique_violation(&e) {
            AppError::Conflict(format!(
                "availability {} is already booked on {}",
                new.availability_id, new.date
            ))
        } else {
            e.into()
        }
    })
}
