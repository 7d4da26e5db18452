pub mod appointments;
pub mod availabilities;
pub mod health;
pub mod payments;
pub mod session;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/users", post(users::signup))
        .route("/consultants", get(users::list_consultants))
        .route(
            "/availabilities",
            get(availabilities::list_availabilities)
                .post(availabilities::create_availability)
                .delete(availabilities::delete_availability),
        )
        .route(
            "/availabilities/bookable-dates",
            get(availabilities::bookable_dates),
        )
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route("/payment-intents", post(payments::create_payment_intent))
        .route("/payments/success", get(payments::payment_success))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
