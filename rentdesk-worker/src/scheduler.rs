/// Periodic worker loop
///
/// Each tick generates the current month's rent records, then runs the
/// reminder dispatcher. Ticks never overlap within one process; overlap
/// with the HTTP cron endpoint is handled by the reminder claim.
///
/// # Architecture
///
/// ```text
/// WorkerScheduler
///   ├─> generate_monthly_rentals(today)
///   └─> ReminderDispatcher::run(today)   (when a channel is configured)
/// ```
///
/// # Example
///
/// ```no_run
/// use rentdesk_worker::scheduler::{SchedulerConfig, WorkerScheduler};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let scheduler = WorkerScheduler::new(pool, None, SchedulerConfig::default());
/// let shutdown = scheduler.shutdown_token();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// scheduler.run().await;
/// # Ok(())
/// # }
/// ```

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_INTERVAL_SECS;
use crate::reminders::{DispatchReport, ReminderDispatcher};
use crate::rentals::{generate_monthly_rentals, GenerationReport};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Seconds between ticks
    pub interval_secs: u64,

    /// Whether to generate rent records on each tick
    pub generate_rentals: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval_secs: DEFAULT_INTERVAL_SECS,
            generate_rentals: true,
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub generation: Option<GenerationReport>,
    pub dispatch: Option<DispatchReport>,
}

pub struct WorkerScheduler {
    pool: PgPool,
    dispatcher: Option<ReminderDispatcher>,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
}

impl WorkerScheduler {
    /// Creates a scheduler; without a dispatcher only rent generation runs
    pub fn new(pool: PgPool, dispatcher: Option<ReminderDispatcher>, config: SchedulerConfig) -> Self {
        WorkerScheduler {
            pool,
            dispatcher,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop after the current tick
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs one tick as of `today`
    ///
    /// Failures are logged; the next tick runs regardless.
    pub async fn tick(&self, today: NaiveDate) -> TickReport {
        let mut report = TickReport::default();

        if self.config.generate_rentals {
            match generate_monthly_rentals(&self.pool, today).await {
                Ok(generation) => report.generation = Some(generation),
                Err(e) => tracing::error!(error = %e, "Monthly rent generation failed"),
            }
        }

        if let Some(dispatcher) = &self.dispatcher {
            match dispatcher.run(today).await {
                Ok(dispatch) => report.dispatch = Some(dispatch),
                Err(e) => tracing::error!(error = %e, "Reminder dispatch failed"),
            }
        }

        report
    }

    /// Ticks every `interval_secs` until shutdown
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            reminders = self.dispatcher.is_some(),
            "Worker scheduler starting"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            self.tick(Utc::now().date_naive()).await;

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(Duration::from_secs(self.config.interval_secs)) => {}
            }
        }

        tracing::info!("Worker scheduler shut down");
    }
}
