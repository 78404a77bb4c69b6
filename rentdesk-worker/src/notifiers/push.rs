/// Push reminders through the OneSignal REST API
///
/// # Request
///
/// ```text
/// POST https://onesignal.com/api/v1/notifications
/// Authorization: Basic <REST API key>
///
/// {
///   "app_id": "...",
///   "include_player_ids": ["<push token>"],
///   "headings": {"en": "...", "fr": "..."},
///   "contents": {"en": "...", "fr": "..."}
/// }
/// ```

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::OneSignalConfig;
use crate::notifiers::{Notifier, NotifyError, NotifyResult, ReminderMessage};

pub const ONESIGNAL_API_URL: &str = "https://onesignal.com/api/v1/notifications";

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    app_id: &'a str,
    include_player_ids: Vec<&'a str>,
    headings: HashMap<&'static str, String>,
    contents: HashMap<&'static str, String>,
    data: serde_json::Value,
}

/// OneSignal push notifier
pub struct PushNotifier {
    client: reqwest::Client,
    config: OneSignalConfig,
    api_url: String,
}

impl PushNotifier {
    pub fn new(config: OneSignalConfig) -> NotifyResult<Self> {
        Self::with_api_url(config, ONESIGNAL_API_URL)
    }

    /// Targets another endpoint, e.g. a local stub
    pub fn with_api_url(config: OneSignalConfig, api_url: impl Into<String>) -> NotifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            api_url: api_url.into(),
        })
    }

    fn payload<'a>(&'a self, message: &'a ReminderMessage, token: &'a str) -> PushPayload<'a> {
        let heading = "Rappel de paiement".to_string();
        let text = message.short_text();

        PushPayload {
            app_id: &self.config.app_id,
            include_player_ids: vec![token],
            headings: HashMap::from([("en", heading.clone()), ("fr", heading)]),
            contents: HashMap::from([("en", text.clone()), ("fr", text)]),
            data: serde_json::json!({
                "type": "rent_reminder",
                "transaction_id": message.transaction_id,
                "lease_id": message.lease_id,
            }),
        }
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    fn channel(&self) -> &str {
        "push"
    }

    fn supports(&self, message: &ReminderMessage) -> bool {
        message
            .push_token
            .as_deref()
            .map(|token| !token.trim().is_empty())
            .unwrap_or(false)
    }

    async fn send(&self, message: &ReminderMessage) -> NotifyResult<()> {
        let token = message
            .push_token
            .as_deref()
            .ok_or_else(|| NotifyError::NoRecipient(self.channel().to_string()))?;

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Basic {}", self.config.api_key))
            .json(&self.payload(message, token))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(transaction_id = %message.transaction_id, "Reminder push sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::notifier_trait::sample_message;

    fn notifier() -> PushNotifier {
        PushNotifier::new(OneSignalConfig {
            app_id: "app-123".to_string(),
            api_key: "key-456".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_supports_requires_push_token() {
        let notifier = notifier();
        let mut message = sample_message();
        assert!(!notifier.supports(&message));

        message.push_token = Some("player-1".to_string());
        assert!(notifier.supports(&message));
    }

    #[test]
    fn test_payload_shape() {
        let notifier = notifier();
        let message = sample_message();
        let payload = serde_json::to_value(notifier.payload(&message, "player-1")).unwrap();

        assert_eq!(payload["app_id"], "app-123");
        assert_eq!(payload["include_player_ids"][0], "player-1");
        assert_eq!(payload["headings"]["fr"], "Rappel de paiement");
        assert!(payload["contents"]["fr"]
            .as_str()
            .unwrap()
            .contains("150 000 FCFA"));
        assert_eq!(payload["data"]["type"], "rent_reminder");
    }

    #[tokio::test]
    async fn test_send_without_token_fails() {
        let notifier = notifier();
        let result = notifier.send(&sample_message()).await;
        assert!(matches!(result, Err(NotifyError::NoRecipient(_))));
    }
}
