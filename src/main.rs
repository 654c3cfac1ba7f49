use dotenvy::dotenv;
use std::sync::Arc;
use stockroom::{
    api::{self, AppState},
    config::{database, settings},
    core::user,
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = settings::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!("Successfully processed application configuration.");

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Seed the administrator on an empty user table
    user::seed_admin(&db, &app_config.sessions)
        .await
        .inspect_err(|e| error!("Failed to seed administrator: {e}"))?;

    // 6. Serve until Ctrl-C
    let listener = tokio::net::TcpListener::bind(&app_config.server.bind_addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {e}", app_config.server.bind_addr))?;
    let state = AppState::new(db, Arc::new(app_config));
    api::serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        return;
    }
    info!("Shutdown signal received");
}
