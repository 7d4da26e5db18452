use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub consultant_username: String,
    pub client_username: String,
    pub availability_id: i64,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
}

/// Fields of an appointment about to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub consultant_username: String,
    pub client_username: String,
    pub availability_id: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub consultant_username: Option<String>,
    pub client_username: Option<String>,
}
