use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use consultbook::config::AppConfig;
use consultbook::db;
use consultbook::handlers;
use consultbook::services::payments::stripe::StripeProvider;
use consultbook::services::pending;
use consultbook::state::AppState;

const PENDING_REAP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY is not set, paid bookings will fail");
    }
    let payments = StripeProvider::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
    );
    tracing::info!(
        currency = %config.payment_currency,
        day_policy = ?config.day_policy,
        pending_ttl_secs = config.pending_booking_ttl_secs,
        "booking configuration loaded"
    );

    let state = Arc::new(AppState::new(conn, config.clone(), Box::new(payments)));

    pending::spawn_reaper(Arc::clone(&state.db), PENDING_REAP_INTERVAL);

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
