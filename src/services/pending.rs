use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::PendingBooking;

pub fn store(conn: &Connection, pending: &PendingBooking) -> Result<(), AppError> {
    queries::insert_pending_booking(conn, pending)?;
    tracing::info!(
        token = %pending.token,
        availability_id = pending.availability_id,
        date = %pending.date,
        expires_at = %pending.expires_at,
        "pending booking stored"
    );
    Ok(())
}

/// Fetches the pending booking for a resume. Expired entries are removed and
/// reported as [`AppError::ResumeExpired`].
pub fn load(conn: &Connection, token: &str) -> Result<PendingBooking, AppError> {
    let pending = queries::get_pending_booking(conn, token)?
        .ok_or_else(|| AppError::Resume("unknown booking token".into()))?;

    if pending.is_expired(Utc::now().naive_utc()) {
        queries::delete_pending_booking(conn, token)?;
        tracing::warn!(token, "pending booking expired before payment completed");
        return Err(AppError::ResumeExpired);
    }
    Ok(pending)
}

pub fn expire(conn: &Connection) -> Result<usize, AppError> {
    let now = Utc::now().naive_utc();
    let expired = queries::expire_pending_bookings(conn, &now)?;
    if expired > 0 {
        tracing::info!(expired, "expired abandoned pending bookings");
    }
    Ok(expired)
}

/// Periodically drops pending bookings whose payment never completed.
pub fn spawn_reaper(db: Arc<Mutex<Connection>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let conn = db.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = expire(&conn) {
                tracing::error!(error = %e, "failed to expire pending bookings");
            }
        }
    })
}
