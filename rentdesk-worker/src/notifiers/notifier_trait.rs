/// Notifier trait and reminder message
///
/// A notifier delivers one late-payment reminder over one channel. The
/// dispatcher never knows which channels exist; it hands every claimed
/// transaction to a single `Arc<dyn Notifier>`, which may fan out to several
/// channels (see [`super::MultiChannelNotifier`]).
///
/// # Contract
///
/// Implementations must:
/// 1. Report through [`Notifier::supports`] whether they can reach the tenant
///    at all (an email notifier without a tenant address cannot)
/// 2. Deliver at most once per [`Notifier::send`] call, without retrying
/// 3. Map transport failures to [`NotifyError`]
///
/// # Example
///
/// ```no_run
/// use rentdesk_worker::notifiers::{Notifier, NotifyResult, ReminderMessage};
/// use async_trait::async_trait;
///
/// struct StdoutNotifier;
///
/// #[async_trait]
/// impl Notifier for StdoutNotifier {
///     fn channel(&self) -> &str {
///         "stdout"
///     }
///
///     fn supports(&self, _message: &ReminderMessage) -> bool {
///         true
///     }
///
///     async fn send(&self, message: &ReminderMessage) -> NotifyResult<()> {
///         println!("{}", message.subject());
///         Ok(())
///     }
/// }
/// ```

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

/// Notifier error types
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The message has no address this channel can use
    #[error("No recipient for channel {0}")]
    NoRecipient(String),

    /// An address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be built
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The transport failed before the provider answered
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with an error status
    #[error("Provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Notifier result type alias
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Late-payment reminder for one rental transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderMessage {
    pub transaction_id: Uuid,
    pub lease_id: Uuid,
    pub tenant_name: String,
    pub tenant_email: Option<String>,
    pub push_token: Option<String>,
    /// Copied on email reminders
    pub owner_email: Option<String>,
    pub amount_due: i64,
    pub currency: String,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
}

const MONTHS_FR: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

/// Formats a date as `5 décembre 2025`
pub fn format_date_fr(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTHS_FR[date.month0() as usize],
        date.year()
    )
}

/// Formats an amount with space-grouped thousands, `XOF` shown as `FCFA`
pub fn format_amount(amount: i64, currency: &str) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    let sign = if amount < 0 { "-" } else { "" };
    let unit = match currency {
        "XOF" | "XAF" => "FCFA",
        other => other,
    };
    format!("{sign}{grouped} {unit}")
}

impl ReminderMessage {
    /// Display name, `Locataire` when the lease has none
    pub fn display_name(&self) -> &str {
        let name = self.tenant_name.trim();
        if name.is_empty() {
            "Locataire"
        } else {
            name
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Rappel : Retard de paiement - Loyer du {}",
            format_date_fr(self.due_date)
        )
    }

    /// Short text for push notifications
    pub fn short_text(&self) -> String {
        format!(
            "Votre loyer de {} était dû le {}. Merci de régulariser votre situation.",
            format_amount(self.amount_due, &self.currency),
            format_date_fr(self.due_date)
        )
    }

    pub fn html_body(&self) -> String {
        let owner_note = if self.owner_email.is_some() {
            r#"<p style="color: #999;">Copie envoyée au propriétaire pour information.</p>"#
        } else {
            ""
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; line-height: 1.6; color: #333;">
  <h2>Rappel de paiement</h2>
  <p>Bonjour <strong>{name}</strong>,</p>
  <p>Sauf erreur de notre part, nous n'avons pas encore reçu le règlement de votre loyer d'un montant de <strong>{amount}</strong>, dont l'échéance était le <strong>{date}</strong>.</p>
  <p>Nous vous remercions de bien vouloir régulariser votre situation dans les meilleurs délais.</p>
  <p>Si vous avez déjà effectué ce paiement, merci de ne pas tenir compte de ce message.</p>
  <p style="font-size: 12px; color: #666;">Ceci est un message automatique.</p>
  {owner_note}
</body>
</html>"#,
            name = self.display_name(),
            amount = format_amount(self.amount_due, &self.currency),
            date = format_date_fr(self.due_date),
        )
    }
}

/// Delivery channel for reminders
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs (e.g. "email", "push")
    fn channel(&self) -> &str;

    /// Whether this channel can reach the tenant of `message`
    fn supports(&self, message: &ReminderMessage) -> bool;

    /// Delivers the reminder once
    async fn send(&self, message: &ReminderMessage) -> NotifyResult<()>;
}

#[cfg(test)]
pub(crate) fn sample_message() -> ReminderMessage {
    ReminderMessage {
        transaction_id: Uuid::new_v4(),
        lease_id: Uuid::new_v4(),
        tenant_name: "Fatou Ndiaye".to_string(),
        tenant_email: Some("fatou@example.sn".to_string()),
        push_token: None,
        owner_email: Some("proprio@example.sn".to_string()),
        amount_due: 150_000,
        currency: "XOF".to_string(),
        due_date: NaiveDate::from_ymd_opt(2025, 12, 5).unwrap(),
        days_overdue: 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount_groups_thousands() {
        assert_eq!(format_amount(150_000, "XOF"), "150 000 FCFA");
        assert_eq!(format_amount(1_250_000, "XOF"), "1 250 000 FCFA");
        assert_eq!(format_amount(999, "EUR"), "999 EUR");
        assert_eq!(format_amount(-4_500, "EUR"), "-4 500 EUR");
    }

    #[test]
    fn test_format_date_fr() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 5).unwrap();
        assert_eq!(format_date_fr(date), "5 décembre 2025");
    }

    #[test]
    fn test_subject_and_body() {
        let message = sample_message();
        assert_eq!(
            message.subject(),
            "Rappel : Retard de paiement - Loyer du 5 décembre 2025"
        );

        let body = message.html_body();
        assert!(body.contains("Fatou Ndiaye"));
        assert!(body.contains("150 000 FCFA"));
        assert!(body.contains("Copie envoyée au propriétaire"));
    }

    #[test]
    fn test_display_name_fallback() {
        let mut message = sample_message();
        message.tenant_name = "  ".to_string();
        assert_eq!(message.display_name(), "Locataire");
    }
}
