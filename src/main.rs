use dotenvy::dotenv;
use factly::{
    api::{self, AppState},
    config::{self, database},
    core::invitation,
    errors::Result,
    mailer::LogMailer,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often overdue invitations are swept.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the main application configuration
    let app_config = config::load_app_config()
        .inspect_err(|e| error!("Failed to load application configuration: {e}"))?;
    if app_config.sessions.bridge_secret.is_none() {
        warn!("No session bridge secret configured; sessions cannot be opened over HTTP");
    }

    // 4. Initialize database
    let db = database::init_db(&app_config.database)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;

    // 5. Background sweep of stale invitations
    tokio::spawn(sweep_invitations(db.clone()));

    // 6. Serve the API
    let bind = app_config.server.bind.clone();
    let state = AppState::new(db, app_config, Arc::new(LogMailer));
    let listener = TcpListener::bind(&bind)
        .await
        .inspect_err(|e| error!("Failed to bind {bind}: {e}"))?;
    info!("Listening on {bind}");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn sweep_invitations(db: DatabaseConnection) {
    let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        match invitation::expire_stale_invitations(&db, Utc::now()).await {
            Ok(0) => {}
            Ok(count) => info!("Expired {count} stale invitations"),
            Err(e) => error!("Invitation expiry sweep failed: {e}"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
