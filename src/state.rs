use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::BookingEvent;
use crate::services::clock::Clock;
use crate::services::payment::PaymentGateway;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub gateway: Box<dyn PaymentGateway>,
    pub clock: Box<dyn Clock>,
    pub events_tx: broadcast::Sender<BookingEvent>,
}

impl AppState {
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.config.payment_window_minutes)
    }
}
