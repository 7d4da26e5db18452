use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::payments::PaymentProcessor;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub payments: Box<dyn PaymentProcessor>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, payments: Box<dyn PaymentProcessor>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            payments,
        }
    }

    /// Locks the shared connection. A poisoned lock still guards a usable
    /// connection since every write runs inside a transaction.
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
