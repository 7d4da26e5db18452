use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentFilter, Availability, NewAppointment, PendingBooking, Role, User,
    ValidAvailability, WeekDay,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("corrupt date {s:?} in database: {e}"))
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

/// True when `err` came from a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

// ── Users ──

pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    role: Role,
) -> anyhow::Result<User> {
    conn.execute(
        "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
        params![username, password_hash, role.as_str()],
    )?;
    Ok(User {
        id: conn.last_insert_rowid(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        role,
    })
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> anyhow::Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, username, password_hash, role FROM users WHERE username = ?1",
            params![username],
            |row| Ok(parse_user_row(row)),
        )
        .optional()?;
    row.transpose()
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, username, password_hash, role FROM users WHERE id = ?1",
            params![id],
            |row| Ok(parse_user_row(row)),
        )
        .optional()?;
    row.transpose()
}

pub fn list_users_by_role(conn: &Connection, role: Role) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password_hash, role FROM users WHERE role = ?1 ORDER BY username ASC",
    )?;
    let rows = stmt.query_map(params![role.as_str()], |row| Ok(parse_user_row(row)))?;

    let mut users = vec![];
    for row in rows {
        users.push(row??);
    }
    Ok(users)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role_str: String = row.get(3)?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| anyhow::anyhow!("unknown role {role_str:?} in database"))?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role,
    })
}

// ── Availabilities ──

const AVAILABILITY_COLUMNS: &str = "a.id, a.consultant_id, a.day, a.start_hour, a.start_minutes, \
     a.end_hour, a.end_minutes, a.include_payment, a.price_minor";

pub fn insert_availability(
    conn: &Connection,
    consultant_id: i64,
    slot: &ValidAvailability,
) -> anyhow::Result<Availability> {
    conn.execute(
        "INSERT INTO availabilities (consultant_id, day, start_hour, start_minutes, end_hour, end_minutes, include_payment, price_minor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            consultant_id,
            slot.day.as_str(),
            slot.window.start_hour,
            slot.window.start_minutes,
            slot.window.end_hour,
            slot.window.end_minutes,
            slot.include_payment as i32,
            slot.price_minor,
        ],
    )?;

    Ok(Availability {
        id: conn.last_insert_rowid(),
        consultant_id,
        day: slot.day,
        start_hour: slot.window.start_hour,
        start_minutes: slot.window.start_minutes,
        end_hour: slot.window.end_hour,
        end_minutes: slot.window.end_minutes,
        booked: false,
        include_payment: slot.include_payment,
        price_minor: slot.price_minor,
    })
}

pub fn get_availability(conn: &Connection, id: i64) -> anyhow::Result<Option<Availability>> {
    let sql = format!(
        "SELECT {AVAILABILITY_COLUMNS},
                EXISTS(SELECT 1 FROM appointments p WHERE p.availability_id = a.id)
         FROM availabilities a WHERE a.id = ?1"
    );
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_availability_row(row)))
        .optional()?;
    row.transpose()
}

/// Lists a consultant's slots. `booked` reflects appointments on `booked_on`
/// when given, or on any date otherwise.
pub fn list_availabilities(
    conn: &Connection,
    consultant_id: i64,
    booked_on: Option<&NaiveDate>,
) -> anyhow::Result<Vec<Availability>> {
    let sql = format!(
        "SELECT {AVAILABILITY_COLUMNS},
                EXISTS(SELECT 1 FROM appointments p
                       WHERE p.availability_id = a.id AND (?2 IS NULL OR p.date = ?2))
         FROM availabilities a WHERE a.consultant_id = ?1 ORDER BY a.id ASC"
    );
    let booked_on = booked_on.map(format_date);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![consultant_id, booked_on], |row| {
        Ok(parse_availability_row(row))
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn delete_availability(
    conn: &Connection,
    id: i64,
    consultant_id: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM availabilities WHERE id = ?1 AND consultant_id = ?2",
        params![id, consultant_id],
    )?;
    Ok(count > 0)
}

fn parse_availability_row(row: &rusqlite::Row) -> anyhow::Result<Availability> {
    let day_str: String = row.get(2)?;
    let day = WeekDay::parse(&day_str)
        .ok_or_else(|| anyhow::anyhow!("unknown weekday {day_str:?} in database"))?;

    Ok(Availability {
        id: row.get(0)?,
        consultant_id: row.get(1)?,
        day,
        start_hour: row.get(3)?,
        start_minutes: row.get(4)?,
        end_hour: row.get(5)?,
        end_minutes: row.get(6)?,
        include_payment: row.get::<_, i32>(7)? != 0,
        price_minor: row.get(8)?,
        booked: row.get::<_, i32>(9)? != 0,
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str =
    "id, consultant_username, client_username, availability_id, date, created_at";

pub fn insert_appointment(conn: &Connection, new: &NewAppointment) -> anyhow::Result<Appointment> {
    let created_at = Utc::now().naive_utc();

    conn.execute(
        "INSERT INTO appointments (consultant_username, client_username, availability_id, date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.consultant_username,
            new.client_username,
            new.availability_id,
            format_date(&new.date),
            format_datetime(&created_at),
        ],
    )?;

    Ok(Appointment {
        id: conn.last_insert_rowid(),
        consultant_username: new.consultant_username.clone(),
        client_username: new.client_username.clone(),
        availability_id: new.availability_id,
        date: new.date,
        created_at: parse_datetime(&format_datetime(&created_at)),
    })
}

pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE (?1 IS NULL OR consultant_username = ?1)
           AND (?2 IS NULL OR client_username = ?2)
         ORDER BY date ASC, id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![filter.consultant_username, filter.client_username],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Appointments where `username` is either side of the booking.
pub fn list_appointments_for_user(
    conn: &Connection,
    username: &str,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE consultant_username = ?1 OR client_username = ?1
         ORDER BY date ASC, id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![username], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn delete_appointments_for_availability(
    conn: &Connection,
    availability_id: i64,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE availability_id = ?1",
        params![availability_id],
    )?;
    Ok(count)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    Ok(Appointment {
        id: row.get(0)?,
        consultant_username: row.get(1)?,
        client_username: row.get(2)?,
        availability_id: row.get(3)?,
        date: parse_date(&date_str)?,
        created_at: parse_datetime(&created_at_str),
    })
}

// ── Pending Bookings ──

pub fn insert_pending_booking(conn: &Connection, pending: &PendingBooking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO pending_bookings (token, consultant_username, client_username, availability_id, date, amount_minor, payment_intent_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            pending.token,
            pending.consultant_username,
            pending.client_username,
            pending.availability_id,
            format_date(&pending.date),
            pending.amount_minor,
            pending.payment_intent_id,
            format_datetime(&pending.created_at),
            format_datetime(&pending.expires_at),
        ],
    )?;
    Ok(())
}

/// Looks a pending booking up regardless of expiry; callers decide.
pub fn get_pending_booking(
    conn: &Connection,
    token: &str,
) -> anyhow::Result<Option<PendingBooking>> {
    let row = conn
        .query_row(
            "SELECT token, consultant_username, client_username, availability_id, date, amount_minor, payment_intent_id, created_at, expires_at
             FROM pending_bookings WHERE token = ?1",
            params![token],
            |row| Ok(parse_pending_row(row)),
        )
        .optional()?;
    row.transpose()
}

/// Unexpired pending bookings a consultant has on `date`.
pub fn list_live_pending_for_day(
    conn: &Connection,
    consultant_username: &str,
    date: &NaiveDate,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<PendingBooking>> {
    let mut stmt = conn.prepare(
        "SELECT token, consultant_username, client_username, availability_id, date, amount_minor, payment_intent_id, created_at, expires_at
         FROM pending_bookings
         WHERE consultant_username = ?1 AND date = ?2 AND expires_at > ?3
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(
        params![consultant_username, format_date(date), format_datetime(now)],
        |row| Ok(parse_pending_row(row)),
    )?;

    let mut pending = vec![];
    for row in rows {
        pending.push(row??);
    }
    Ok(pending)
}

pub fn delete_pending_booking(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM pending_bookings WHERE token = ?1", params![token])?;
    Ok(count > 0)
}

pub fn delete_pending_for_availability(
    conn: &Connection,
    availability_id: i64,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM pending_bookings WHERE availability_id = ?1",
        params![availability_id],
    )?;
    Ok(count)
}

pub fn expire_pending_bookings(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM pending_bookings WHERE expires_at <= ?1",
        params![format_datetime(now)],
    )?;
    Ok(count)
}

fn parse_pending_row(row: &rusqlite::Row) -> anyhow::Result<PendingBooking> {
    let date_str: String = row.get(4)?;
    let created_at_str: String = row.get(7)?;
    let expires_at_str: String = row.get(8)?;

    Ok(PendingBooking {
        token: row.get(0)?,
        consultant_username: row.get(1)?,
        client_username: row.get(2)?,
        availability_id: row.get(3)?,
        date: parse_date(&date_str)?,
        amount_minor: row.get(5)?,
        payment_intent_id: row.get(6)?,
        created_at: parse_datetime(&created_at_str),
        expires_at: parse_datetime(&expires_at_str),
    })
}
