/// Email reminders over SMTP
///
/// Sends the HTML reminder to the tenant, with the owner in CC when the lease
/// has one. The transport is a pooled `lettre` async SMTP connection.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::notifiers::{Notifier, NotifyError, NotifyResult, ReminderMessage};

/// SMTP email notifier
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn parse_mailbox(address: &str) -> NotifyResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress(format!("{address}: {e}")))
}

impl EmailNotifier {
    /// Builds the SMTP transport (STARTTLS relay)
    ///
    /// # Errors
    ///
    /// Returns an error if the sender address or relay host is invalid.
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let from = parse_mailbox(&config.from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Builds the email for a reminder
    pub fn build_message(&self, message: &ReminderMessage) -> NotifyResult<Message> {
        let to = message
            .tenant_email
            .as_deref()
            .ok_or_else(|| NotifyError::NoRecipient(self.channel().to_string()))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(message.subject())
            .header(ContentType::TEXT_HTML);

        if let Some(owner) = message.owner_email.as_deref() {
            builder = builder.cc(parse_mailbox(owner)?);
        }

        builder
            .body(message.html_body())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &str {
        "email"
    }

    fn supports(&self, message: &ReminderMessage) -> bool {
        message
            .tenant_email
            .as_deref()
            .map(|email| !email.trim().is_empty())
            .unwrap_or(false)
    }

    async fn send(&self, message: &ReminderMessage) -> NotifyResult<()> {
        let email = self.build_message(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::info!(
            transaction_id = %message.transaction_id,
            cc_owner = message.owner_email.is_some(),
            "Reminder email sent"
        );
        Ok(())
    }
}
