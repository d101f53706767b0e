use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::i18n::Translator;
use crate::services::payment::PaymentGateway;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub gateway: Box<dyn PaymentGateway>,
    pub i18n: Translator,
}

impl AppState {
    /// Every use case runs its own transaction, so a panic elsewhere leaves
    /// nothing half-written behind the lock.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
