use std::env;

use crate::services::conflict::DayPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub payment_currency: String,
    pub public_base_url: String,
    pub pending_booking_ttl_secs: i64,
    pub day_policy: DayPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "consultbook.db".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "eur".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            pending_booking_ttl_secs: env::var("PENDING_BOOKING_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(1800),
            day_policy: env::var("BOOKING_DAY_POLICY")
                .ok()
                .and_then(|v| DayPolicy::parse(&v))
                .unwrap_or_default(),
        }
    }
}
