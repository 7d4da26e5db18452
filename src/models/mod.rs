pub mod appointment;
pub mod availability;
pub mod pending_booking;
pub mod user;

pub use appointment::{Appointment, AppointmentFilter, NewAppointment};
pub use availability::{Availability, NewAvailability, TimeWindow, ValidAvailability, WeekDay};
pub use pending_booking::PendingBooking;
pub use user::{Role, User};
