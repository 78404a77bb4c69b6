/// Fan-out over several channels
///
/// Sends through every channel that supports the message. The reminder counts
/// as delivered when at least one channel succeeds; failures on the other
/// channels are logged.

use async_trait::async_trait;
use std::sync::Arc;

use crate::notifiers::{Notifier, NotifyError, NotifyResult, ReminderMessage};

pub struct MultiChannelNotifier {
    channels: Vec<Arc<dyn Notifier>>,
}

impl MultiChannelNotifier {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Names of the configured channels
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel()).collect()
    }
}

#[async_trait]
impl Notifier for MultiChannelNotifier {
    fn channel(&self) -> &str {
        "multi"
    }

    fn supports(&self, message: &ReminderMessage) -> bool {
        self.channels.iter().any(|c| c.supports(message))
    }

    async fn send(&self, message: &ReminderMessage) -> NotifyResult<()> {
        let mut delivered = 0;
        let mut last_error = None;

        for channel in self.channels.iter().filter(|c| c.supports(message)) {
            match channel.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %message.transaction_id,
                        channel = channel.channel(),
                        error = %e,
                        "Reminder channel failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(NotifyError::NoRecipient(self.channel().to_string())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::notifier_trait::sample_message;
    use crate::notifiers::MockNotifier;

    #[tokio::test]
    async fn test_delivered_if_any_channel_succeeds() {
        let message = sample_message();
        let ok = Arc::new(MockNotifier::new());
        let failing: Arc<dyn Notifier> =
            Arc::new(MockNotifier::new().failing_for(message.transaction_id));
        let multi = MultiChannelNotifier::new(vec![failing, ok.clone() as Arc<dyn Notifier>]);

        multi.send(&message).await.unwrap();
        assert_eq!(ok.sent_count(message.transaction_id).await, 1);
    }

    #[tokio::test]
    async fn test_fails_when_every_channel_fails() {
        let message = sample_message();
        let failing: Arc<dyn Notifier> =
            Arc::new(MockNotifier::new().failing_for(message.transaction_id));
        let multi = MultiChannelNotifier::new(vec![failing]);

        assert!(matches!(
            multi.send(&message).await,
            Err(NotifyError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_no_supporting_channel() {
        let mut message = sample_message();
        message.tenant_email = None;
        let email_only: Arc<dyn Notifier> = Arc::new(MockNotifier::new().email_only());
        let multi = MultiChannelNotifier::new(vec![email_only]);

        assert!(!multi.supports(&message));
        assert!(matches!(
            multi.send(&message).await,
            Err(NotifyError::NoRecipient(_))
        ));
    }
}
