/// Worker and notifier configuration
///
/// # Environment Variables
///
/// - `WORKER_INTERVAL_SECS`: seconds between dispatch runs (default: 3600)
/// - `REMINDER_GRACE_DAYS`: days past the due date before reminding (default: 5)
/// - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
/// - `MAIL_FROM`: sender mailbox, required with `SMTP_HOST`
/// - `ONESIGNAL_APP_ID`, `ONESIGNAL_API_KEY`: push channel, both or neither
///
/// The database settings come from [`rentdesk_shared::db::pool::DatabaseConfig`].

use rentdesk_shared::db::pool::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

pub const DEFAULT_GRACE_DAYS: i64 = 5;

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Sender mailbox, e.g. `Rentdesk <no-reply@rentdesk.app>`
    pub from: String,
}

/// OneSignal credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneSignalConfig {
    pub app_id: String,
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// Enabled notification channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub smtp: Option<SmtpConfig>,
    pub onesignal: Option<OneSignalConfig>,
    /// Days past the due date before a reminder is sent
    pub grace_days: i64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            smtp: None,
            onesignal: None,
            grace_days: DEFAULT_GRACE_DAYS,
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl NotifierConfig {
    /// Reads the notification channels from the environment
    ///
    /// # Errors
    ///
    /// Returns an error for half-configured channels or unparsable numbers.
    pub fn from_env() -> anyhow::Result<Self> {
        let smtp = match optional("SMTP_HOST") {
            Some(host) => {
                let from = optional("MAIL_FROM")
                    .ok_or_else(|| anyhow::anyhow!("MAIL_FROM is required when SMTP_HOST is set"))?;
                let port = optional("SMTP_PORT")
                    .unwrap_or_else(|| "587".to_string())
                    .parse::<u16>()?;

                Some(SmtpConfig {
                    host,
                    port,
                    username: optional("SMTP_USERNAME"),
                    password: optional("SMTP_PASSWORD"),
                    from,
                })
            }
            None => None,
        };

        let onesignal = match (optional("ONESIGNAL_APP_ID"), optional("ONESIGNAL_API_KEY")) {
            (Some(app_id), Some(api_key)) => Some(OneSignalConfig { app_id, api_key }),
            (None, None) => None,
            _ => anyhow::bail!("ONESIGNAL_APP_ID and ONESIGNAL_API_KEY must be set together"),
        };

        let grace_days = optional("REMINDER_GRACE_DAYS")
            .map(|v| v.parse::<i64>())
            .transpose()?
            .unwrap_or(DEFAULT_GRACE_DAYS);

        if grace_days < 0 {
            anyhow::bail!("REMINDER_GRACE_DAYS must not be negative");
        }

        Ok(Self {
            smtp,
            onesignal,
            grace_days,
        })
    }
}

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub notifier: NotifierConfig,
    /// Seconds between scheduler ticks
    pub interval_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let interval_secs = optional("WORKER_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()?
            .unwrap_or(DEFAULT_INTERVAL_SECS);

        if interval_secs == 0 {
            anyhow::bail!("WORKER_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            notifier: NotifierConfig::from_env()?,
            interval_secs,
        })
    }
}
