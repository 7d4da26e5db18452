pub mod appointments;
pub mod booking;
pub mod conflict;
pub mod payments;
pub mod pending;
pub mod slots;
pub mod users;
