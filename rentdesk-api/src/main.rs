//! # Rentdesk API Server
//!
//! Serves the staff API (teams, permissions, activation, payments), the
//! tenant portal and the scheduled job endpoints.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p rentdesk-api
//! ```

use rentdesk_api::{
    app::{build_router, AppState},
    config::Config,
};
use rentdesk_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use rentdesk_worker::notifiers;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rentdesk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Rentdesk API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;

    let notifier = notifiers::from_config(&config.notifier)?;
    let bind_address = config.bind_address();

    let state = AppState::new(pool.clone(), config, notifier);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
