use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AppointmentFilter, Availability, NewAvailability, Role, User};
use crate::services::conflict::{ConflictChecker, DayPolicy, Unbookable};

/// How a request names the consultant owning a set of slots.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsultantRef {
    Id(i64),
    Username(String),
}

impl ConsultantRef {
    pub fn from_parts(id: Option<i64>, username: Option<String>) -> Result<Self, AppError> {
        match (id, username.filter(|u| !u.trim().is_empty())) {
            (Some(id), _) => Ok(ConsultantRef::Id(id)),
            (None, Some(username)) => Ok(ConsultantRef::Username(username.trim().to_string())),
            (None, None) => Err(AppError::MissingFields("consultantId or username".into())),
        }
    }
}

pub fn resolve_consultant(conn: &Connection, by: &ConsultantRef) -> Result<User, AppError> {
    let user = match by {
        ConsultantRef::Id(id) => queries::get_user_by_id(conn, *id)?,
        ConsultantRef::Username(username) => queries::get_user_by_username(conn, username)?,
    };

    match user {
        Some(u) if u.role == Role::Consultant => Ok(u),
        _ => Err(AppError::NotFound(match by {
            ConsultantRef::Id(id) => format!("consultant {id}"),
            ConsultantRef::Username(username) => format!("consultant {username}"),
        })),
    }
}

/// Lists a consultant's slots. With `booked_on`, a slot counts as booked when
/// the conflict checker refuses it for that date, so under the per-day policy
/// every slot of an already booked day is reported booked.
pub fn list(
    conn: &Connection,
    consultant: &User,
    booked_on: Option<&NaiveDate>,
    policy: DayPolicy,
) -> Result<Vec<Availability>, AppError> {
    let mut slots = queries::list_availabilities(conn, consultant.id, booked_on)?;
    let Some(date) = booked_on else {
        return Ok(slots);
    };

    let booked = queries::list_appointments(
        conn,
        &AppointmentFilter {
            consultant_username: Some(consultant.username.clone()),
            client_username: None,
        },
    )?;
    let taken: Vec<bool> = {
        let checker = ConflictChecker::new(&slots, &booked, policy);
        slots
            .iter()
            .map(|s| {
                matches!(
                    checker.check(*date, s.id),
                    Err(Unbookable::SlotTaken | Unbookable::DayTaken)
                )
            })
            .collect()
    };
    for (slot, taken) in slots.iter_mut().zip(taken) {
        slot.booked = taken;
    }
    Ok(slots)
}

pub fn create(
    conn: &Connection,
    consultant_id: i64,
    new: &NewAvailability,
) -> Result<Availability, AppError> {
    let valid = new.validate()?;
    let slot = queries::insert_availability(conn, consultant_id, &valid)?;

    tracing::info!(
        availability_id = slot.id,
        consultant_id,
        day = slot.day.as_str(),
        start = %slot.window().format_start(),
        end = %slot.window().format_end(),
        "availability created"
    );
    Ok(slot)
}

/// Deletes a slot together with its appointments and pending bookings.
/// Returns the number of appointments removed.
pub fn delete(
    conn: &mut Connection,
    availability_id: i64,
    consultant_id: i64,
) -> Result<usize, AppError> {
    let tx = conn.transaction()?;

    match queries::get_availability(&tx, availability_id)? {
        Some(slot) if slot.consultant_id == consultant_id => {}
        _ => {
            return Err(AppError::NotFound(format!(
                "availability {availability_id} for consultant {consultant_id}"
            )))
        }
    }

    let pending = queries::delete_pending_for_availability(&tx, availability_id)?;
    let appointments = queries::delete_appointments_for_availability(&tx, availability_id)?;
    if !queries::delete_availability(&tx, availability_id, consultant_id)? {
        return Err(AppError::NotFound(format!("availability {availability_id}")));
    }

    tx.commit()?;

    tracing::info!(
        availability_id,
        consultant_id,
        appointments,
        pending,
        "availability deleted"
    );
    Ok(appointments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{NewAppointment, PendingBooking};
    use crate::services::pending;
    use chrono::Utc;

    fn setup() -> (Connection, User) {
        let conn = db::init_db(":memory:").unwrap();
        let consultant = queries::create_user(&conn, "carol", "hash", Role::Consultant).unwrap();
        queries::create_user(&conn, "xavier", "hash", Role::Client).unwrap();
        (conn, consultant)
    }

    fn monday() -> NewAvailability {
        serde_json::from_str(
            r#"{"day":"Monday","startHour":9,"startMinutes":0,"endHour":10,"endMinutes":0,"includePayment":false}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_create_then_list_roundtrip() {
        let (conn, consultant) = setup();
        let created = create(&conn, consultant.id, &monday()).unwrap();

        let listed = list(&conn, &consultant, None, DayPolicy::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert!(!listed[0].booked);
        assert_eq!(listed[0].start_hour, 9);
        assert_eq!(listed[0].end_hour, 10);
    }

    #[test]
    fn test_create_rejects_invalid_range() {
        let (conn, consultant) = setup();
        let mut slot = monday();
        slot.end_hour = 8;
        assert!(matches!(
            create(&conn, consultant.id, &slot),
            Err(AppError::Validation(_))
        ));
        assert!(list(&conn, &consultant, None, DayPolicy::default()).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_consultant() {
        let (conn, consultant) = setup();
        let by_name = resolve_consultant(&conn, &ConsultantRef::Username("carol".into())).unwrap();
        assert_eq!(by_name.id, consultant.id);

        // Clients are not consultants.
        assert!(matches!(
            resolve_consultant(&conn, &ConsultantRef::Username("xavier".into())),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            resolve_consultant(&conn, &ConsultantRef::Id(404)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_consultant_ref_requires_one_field() {
        assert!(matches!(
            ConsultantRef::from_parts(None, Some("  ".into())),
            Err(AppError::MissingFields(_))
        ));
        assert_eq!(
            ConsultantRef::from_parts(Some(3), Some("carol".into())).unwrap(),
            ConsultantRef::Id(3)
        );
    }

    #[test]
    fn test_delete_cascades_appointments() {
        let (mut conn, consultant) = setup();
        let slot = create(&conn, consultant.id, &monday()).unwrap();
        queries::insert_appointment(
            &conn,
            &NewAppointment {
                consultant_username: "carol".into(),
                client_username: "xavier".into(),
                availability_id: slot.id,
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            },
        )
        .unwrap();

        let removed = delete(&mut conn, slot.id, consultant.id).unwrap();
        assert_eq!(removed, 1);
        assert!(list(&conn, &consultant, None, DayPolicy::default()).unwrap().is_empty());
        assert!(queries::list_appointments(&conn, &AppointmentFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_requires_ownership() {
        let (mut conn, consultant) = setup();
        let other = queries::create_user(&conn, "dave", "hash", Role::Consultant).unwrap();
        let slot = create(&conn, consultant.id, &monday()).unwrap();

        assert!(matches!(
            delete(&mut conn, slot.id, other.id),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(list(&conn, &consultant, None, DayPolicy::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_drops_pending_bookings() {
        let (mut conn, consultant) = setup();
        let slot = create(&conn, consultant.id, &monday()).unwrap();
        let now = Utc::now().naive_utc();
        pending::store(
            &conn,
            &PendingBooking {
                token: "tok-held".into(),
                consultant_username: "carol".into(),
                client_username: "xavier".into(),
                availability_id: slot.id,
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                amount_minor: 4200,
                payment_intent_id: "pi_held".into(),
                created_at: now,
                expires_at: now + chrono::Duration::minutes(30),
            },
        )
        .unwrap();

        assert_eq!(delete(&mut conn, slot.id, consultant.id).unwrap(), 0);
        assert!(queries::get_pending_booking(&conn, "tok-held").unwrap().is_none());
        assert!(matches!(
            pending::load(&conn, "tok-held"),
            Err(AppError::Resume(_))
        ));
    }

    #[test]
    fn test_list_booked_on_date_follows_day_policy() {
        let (conn, consultant) = setup();
        let morning = create(&conn, consultant.id, &monday()).unwrap();
        let mut later = monday();
        later.start_hour = 14;
        later.end_hour = 15;
        let afternoon = create(&conn, consultant.id, &later).unwrap();
        queries::insert_appointment(
            &conn,
            &NewAppointment {
                consultant_username: "carol".into(),
                client_username: "xavier".into(),
                availability_id: morning.id,
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            },
        )
        .unwrap();
        let monday_date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let booked = |policy| -> Vec<(i64, bool)> {
            list(&conn, &consultant, Some(&monday_date), policy)
                .unwrap()
                .iter()
                .map(|s| (s.id, s.booked))
                .collect()
        };

        assert_eq!(
            booked(DayPolicy::OnePerConsultantDay),
            vec![(morning.id, true), (afternoon.id, true)]
        );
        assert_eq!(
            booked(DayPolicy::OnePerSlotDate),
            vec![(morning.id, true), (afternoon.id, false)]
        );

        // Another Monday is free again.
        let next = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let listed = list(&conn, &consultant, Some(&next), DayPolicy::default()).unwrap();
        assert!(listed.iter().all(|s| !s.booked));
    }
}
