use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub gateway_url: String,
    pub gateway_api_key: String,
    /// Minutes a pending booking may wait for payment before it expires.
    pub payment_window_minutes: i64,
    /// How often the expiration sweep runs.
    pub reaper_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "roombook.db".to_string()),
            gateway_url: env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            gateway_api_key: env::var("PAYMENT_GATEWAY_API_KEY").unwrap_or_default(),
            payment_window_minutes: env::var("PAYMENT_WINDOW_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            reaper_interval_secs: env::var("REAPER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}
