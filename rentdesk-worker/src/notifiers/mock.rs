/// Mock notifier for tests and local runs
///
/// Records every message it is asked to send. Failures can be forced for
/// specific transactions to exercise the dispatcher's error isolation.
///
/// # Example
///
/// ```no_run
/// use rentdesk_worker::notifiers::{MockNotifier, Notifier};
///
/// # async fn example() {
/// let notifier = MockNotifier::new();
/// println!("Channel: {}", notifier.channel());
/// println!("Sent so far: {}", notifier.sent().await.len());
/// # }
/// ```

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::notifiers::{Notifier, NotifyError, NotifyResult, ReminderMessage};

/// In-memory notifier
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<ReminderMessage>>,
    failing: HashSet<Uuid>,
    require_email: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every send for this transaction
    pub fn failing_for(mut self, transaction_id: Uuid) -> Self {
        self.failing.insert(transaction_id);
        self
    }

    /// Only supports messages with a tenant email, like the email channel
    pub fn email_only(mut self) -> Self {
        self.require_email = true;
        self
    }

    /// Messages delivered so far
    pub async fn sent(&self) -> Vec<ReminderMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self, transaction_id: Uuid) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.transaction_id == transaction_id)
            .count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn channel(&self) -> &str {
        "mock"
    }

    fn supports(&self, message: &ReminderMessage) -> bool {
        !self.require_email || message.tenant_email.is_some()
    }

    async fn send(&self, message: &ReminderMessage) -> NotifyResult<()> {
        if self.failing.contains(&message.transaction_id) {
            return Err(NotifyError::Transport("mock transport failure".to_string()));
        }

        tracing::debug!(transaction_id = %message.transaction_id, "Mock reminder recorded");
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::notifier_trait::sample_message;

    #[tokio::test]
    async fn test_records_sent_messages() {
        let notifier = MockNotifier::new();
        let message = sample_message();

        notifier.send(&message).await.unwrap();
        assert_eq!(notifier.sent_count(message.transaction_id).await, 1);
    }

    #[tokio::test]
    async fn test_forced_failure() {
        let message = sample_message();
        let notifier = MockNotifier::new().failing_for(message.transaction_id);

        assert!(notifier.send(&message).await.is_err());
        assert!(notifier.sent().await.is_empty());
    }

    #[test]
    fn test_email_only_support() {
        let notifier = MockNotifier::new().email_only();
        let mut message = sample_message();
        assert!(notifier.supports(&message));

        message.tenant_email = None;
        assert!(!notifier.supports(&message));
    }
}
