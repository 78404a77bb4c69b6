/// Reminder delivery channels
///
/// - `email`: SMTP via lettre, owner in CC
/// - `push`: OneSignal REST API
/// - `multi`: fan-out over the configured channels
/// - `mock`: in-memory recorder for tests

pub mod email;
pub mod mock;
pub mod multi;
pub mod notifier_trait;
pub mod push;

pub use email::EmailNotifier;
pub use mock::MockNotifier;
pub use multi::MultiChannelNotifier;
pub use notifier_trait::{format_amount, format_date_fr, Notifier, NotifyError, NotifyResult, ReminderMessage};
pub use push::PushNotifier;

use std::sync::Arc;

use crate::config::NotifierConfig;

/// Builds the notifier for the configured channels
///
/// # Returns
///
/// `None` when no channel is configured
pub fn from_config(config: &NotifierConfig) -> NotifyResult<Option<Arc<dyn Notifier>>> {
    let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();

    if let Some(smtp) = &config.smtp {
        channels.push(Arc::new(EmailNotifier::new(smtp)?));
    }
    if let Some(onesignal) = &config.onesignal {
        channels.push(Arc::new(PushNotifier::new(onesignal.clone())?));
    }

    if channels.is_empty() {
        tracing::warn!("No notification channel configured; reminders are disabled");
        return Ok(None);
    }

    let multi = MultiChannelNotifier::new(channels);
    tracing::info!(channels = ?multi.channel_names(), "Reminder channels ready");
    Ok(Some(Arc::new(multi)))
}
