//! # Rentdesk Worker
//!
//! Runs rent generation and late-payment reminders on an interval.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p rentdesk-worker
//! ```
//!
//! Stops after the current tick on ctrl-c.

use std::sync::Arc;

use rentdesk_shared::db::pool::{close_pool, create_pool};
use rentdesk_worker::config::WorkerConfig;
use rentdesk_worker::notifiers;
use rentdesk_worker::reminders::{PgReminderStore, ReminderDispatcher};
use rentdesk_worker::scheduler::{SchedulerConfig, WorkerScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rentdesk_worker=debug,rentdesk_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Rentdesk Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(config.database.clone()).await?;

    let dispatcher = notifiers::from_config(&config.notifier)?.map(|notifier| {
        let store = Arc::new(PgReminderStore::new(pool.clone()));
        ReminderDispatcher::new(store, notifier).with_grace_days(config.notifier.grace_days)
    });

    let scheduler = WorkerScheduler::new(
        pool.clone(),
        dispatcher,
        SchedulerConfig {
            interval_secs: config.interval_secs,
            ..Default::default()
        },
    );

    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    scheduler.run().await;
    close_pool(pool).await;

    Ok(())
}
