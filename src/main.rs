use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use roombook::config::AppConfig;
use roombook::db;
use roombook::handlers;
use roombook::services::cleanup;
use roombook::services::clock::SystemClock;
use roombook::services::payment::http::HttpPaymentGateway;
use roombook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let gateway = HttpPaymentGateway::new(config.gateway_url.clone(), config.gateway_api_key.clone());

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(gateway),
        clock: Box::new(SystemClock),
        events_tx,
    });

    tokio::spawn(cleanup::run(Arc::clone(&state)));

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
