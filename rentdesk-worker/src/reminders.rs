/// Late-payment reminder dispatch
///
/// One run scans unpaid, not-yet-reminded rent records and sends at most one
/// reminder per record:
///
/// ```text
/// fetch candidates (period_year >= today.year - 1)
///   └─> for each candidate
///         ├─> skip: paid, already reminded, unreachable, not overdue yet
///         ├─> claim (conditional UPDATE, exactly one winner)
///         └─> deliver via the notifier
/// ```
///
/// The claim happens before delivery. A delivery failure after the claim is
/// reported and the flag stays set, so overlapping runs never send twice and
/// a failed send is retried only after an explicit reset.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rentdesk_shared::models::rental_transaction::{
    ReminderCandidate, RentalTransaction, TransactionStatus,
};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DEFAULT_GRACE_DAYS;
use crate::notifiers::{Notifier, ReminderMessage};

/// Billing day used when neither the lease nor the team sets one
pub const DEFAULT_BILLING_DAY: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to load reminder candidates: {0}")]
    Candidates(#[source] sqlx::Error),
}

/// Access to reminder state
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Unpaid, not-yet-reminded records from `min_year` on
    async fn fetch_candidates(&self, min_year: i32) -> Result<Vec<ReminderCandidate>, sqlx::Error>;

    /// Flips `reminder_sent` if still unset and unpaid; true for the winner
    async fn claim(&self, transaction_id: Uuid) -> Result<bool, sqlx::Error>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn fetch_candidates(&self, min_year: i32) -> Result<Vec<ReminderCandidate>, sqlx::Error> {
        RentalTransaction::find_reminder_candidates(&self.pool, min_year).await
    }

    async fn claim(&self, transaction_id: Uuid) -> Result<bool, sqlx::Error> {
        RentalTransaction::claim_reminder(&self.pool, transaction_id).await
    }
}

/// Outcome of one dispatch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Reminders delivered
    pub count: usize,
    pub scanned: usize,
    /// Not eligible in this run
    pub skipped: usize,
    /// Claimed by a concurrent run
    pub already_claimed: usize,
    pub failed: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DispatchReport {
    fn finish(mut self) -> Self {
        self.message = if self.count == 0 && self.failed == 0 {
            "Aucun paiement en retard détecté.".to_string()
        } else {
            format!("{} relances envoyées avec succès.", self.count)
        };
        self
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
}

/// Due date of a rent period
///
/// The billing day falls back to 5 when unset or out of range and is clamped
/// to the length of the month (31 in February is the 28th or 29th).
pub fn due_date(year: i32, month: u32, billing_day: Option<i16>) -> Option<NaiveDate> {
    let day = billing_day
        .filter(|d| (1..=31).contains(d))
        .map(|d| d as u32)
        .unwrap_or(DEFAULT_BILLING_DAY);

    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// Whole days between the due date and `today`; negative before the due date
pub fn days_overdue(due: NaiveDate, today: NaiveDate) -> i64 {
    (today - due).num_days()
}

/// Sends late-payment reminders
pub struct ReminderDispatcher {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    grace_days: i64,
}

enum Eligibility {
    Eligible(ReminderMessage),
    Skip(&'static str),
}

impl ReminderDispatcher {
    pub fn new(store: Arc<dyn ReminderStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            grace_days: DEFAULT_GRACE_DAYS,
        }
    }

    pub fn with_grace_days(mut self, grace_days: i64) -> Self {
        self.grace_days = grace_days;
        self
    }

    fn check(&self, candidate: &ReminderCandidate, today: NaiveDate) -> Eligibility {
        if candidate.status == TransactionStatus::Paid {
            return Eligibility::Skip("paid");
        }
        if candidate.reminder_sent {
            return Eligibility::Skip("already_reminded");
        }

        let Some(due) = u32::try_from(candidate.period_month)
            .ok()
            .and_then(|month| due_date(candidate.period_year, month, candidate.billing_day))
        else {
            return Eligibility::Skip("invalid_period");
        };

        let overdue = days_overdue(due, today);
        if overdue < self.grace_days {
            return Eligibility::Skip("not_overdue");
        }

        let message = ReminderMessage {
            transaction_id: candidate.transaction_id,
            lease_id: candidate.lease_id,
            tenant_name: candidate.tenant_name.clone(),
            tenant_email: candidate.tenant_email.clone(),
            push_token: candidate.tenant_push_token.clone(),
            owner_email: candidate.owner_email.clone(),
            amount_due: candidate.amount_due,
            currency: candidate.currency.clone(),
            due_date: due,
            days_overdue: overdue,
        };

        if !self.notifier.supports(&message) {
            return Eligibility::Skip("no_channel");
        }

        Eligibility::Eligible(message)
    }

    /// Runs one dispatch pass as of `today`
    ///
    /// # Errors
    ///
    /// Only a failure to load candidates aborts the run. Claim and delivery
    /// failures are counted per record in the report.
    #[tracing::instrument(skip(self), fields(grace_days = self.grace_days))]
    pub async fn run(&self, today: NaiveDate) -> Result<DispatchReport, DispatchError> {
        let candidates = self
            .store
            .fetch_candidates(today.year() - 1)
            .await
            .map_err(DispatchError::Candidates)?;

        let mut report = DispatchReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            let transaction_id = candidate.transaction_id;

            let message = match self.check(candidate, today) {
                Eligibility::Eligible(message) => message,
                Eligibility::Skip(reason) => {
                    tracing::debug!(%transaction_id, reason, "Reminder skipped");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.store.claim(transaction_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(%transaction_id, "Reminder already claimed");
                    report.already_claimed += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(%transaction_id, error = %e, "Failed to claim reminder");
                    report.failed += 1;
                    report.errors.push(format!("{transaction_id}: claim failed: {e}"));
                    continue;
                }
            }

            match self.notifier.send(&message).await {
                Ok(()) => {
                    tracing::info!(
                        %transaction_id,
                        days_overdue = message.days_overdue,
                        "Reminder delivered"
                    );
                    report.count += 1;
                }
                Err(e) => {
                    tracing::error!(
                        %transaction_id,
                        channel = self.notifier.channel(),
                        error = %e,
                        "Reminder delivery failed after claim"
                    );
                    report.failed += 1;
                    report.errors.push(format!("{transaction_id}: {e}"));
                }
            }
        }

        let report = report.finish();
        tracing::info!(
            scanned = report.scanned,
            delivered = report.count,
            skipped = report.skipped,
            already_claimed = report.already_claimed,
            failed = report.failed,
            "Reminder dispatch finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::MockNotifier;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Rows keyed by transaction ID
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<Uuid, ReminderCandidate>>,
    }

    impl MemoryStore {
        async fn insert(&self, candidate: ReminderCandidate) {
            self.rows.lock().await.insert(candidate.transaction_id, candidate);
        }

        async fn reminder_sent(&self, id: Uuid) -> bool {
            self.rows.lock().await[&id].reminder_sent
        }

        async fn reset(&self, id: Uuid) {
            if let Some(row) = self.rows.lock().await.get_mut(&id) {
                if row.status != TransactionStatus::Paid {
                    row.reminder_sent = false;
                }
            }
        }
    }

    #[async_trait]
    impl ReminderStore for MemoryStore {
        // Returns every row so the dispatcher's own filtering is exercised
        async fn fetch_candidates(&self, min_year: i32) -> Result<Vec<ReminderCandidate>, sqlx::Error> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .await
                .values()
                .filter(|r| r.period_year >= min_year)
                .cloned()
                .collect();
            rows.sort_by_key(|r| (r.period_year, r.period_month, r.transaction_id));
            Ok(rows)
        }

        async fn claim(&self, transaction_id: Uuid) -> Result<bool, sqlx::Error> {
            let mut rows = self.rows.lock().await;
            match rows.get_mut(&transaction_id) {
                Some(row) if !row.reminder_sent && row.status != TransactionStatus::Paid => {
                    row.reminder_sent = true;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn candidate(month: i16, year: i32, status: TransactionStatus) -> ReminderCandidate {
        ReminderCandidate {
            transaction_id: Uuid::new_v4(),
            lease_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            period_month: month,
            period_year: year,
            amount_due: 150_000,
            status,
            reminder_sent: false,
            billing_day: None,
            currency: "XOF".to_string(),
            tenant_name: "Moussa Diop".to_string(),
            tenant_email: Some("moussa@example.sn".to_string()),
            tenant_push_token: None,
            owner_email: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dispatcher(store: Arc<MemoryStore>, notifier: Arc<MockNotifier>) -> ReminderDispatcher {
        ReminderDispatcher::new(store, notifier)
    }

    #[test]
    fn test_due_date_defaults_and_clamps() {
        assert_eq!(due_date(2025, 12, None), Some(date(2025, 12, 5)));
        assert_eq!(due_date(2025, 12, Some(10)), Some(date(2025, 12, 10)));
        assert_eq!(due_date(2025, 2, Some(31)), Some(date(2025, 2, 28)));
        assert_eq!(due_date(2024, 2, Some(31)), Some(date(2024, 2, 29)));
        assert_eq!(due_date(2025, 4, Some(0)), Some(date(2025, 4, 5)));
        assert_eq!(due_date(2025, 13, None), None);
    }

    #[test]
    fn test_days_overdue() {
        assert_eq!(days_overdue(date(2025, 12, 5), date(2025, 12, 10)), 5);
        assert_eq!(days_overdue(date(2025, 12, 5), date(2025, 12, 1)), -4);
    }

    #[tokio::test]
    async fn test_paid_is_never_delivered() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());

        let mut paid = candidate(11, 2025, TransactionStatus::Paid);
        store.insert(paid.clone()).await;
        paid.transaction_id = Uuid::new_v4();
        paid.reminder_sent = true;
        store.insert(paid).await;

        let report = dispatcher(store, notifier.clone())
            .run(date(2026, 1, 15))
            .await
            .unwrap();

        assert_eq!(report.count, 0);
        assert_eq!(report.skipped, 2);
        assert!(notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_already_reminded_is_skipped() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());

        let mut reminded = candidate(11, 2025, TransactionStatus::Late);
        reminded.reminder_sent = true;
        store.insert(reminded).await;

        let report = dispatcher(store, notifier.clone())
            .run(date(2026, 1, 15))
            .await
            .unwrap();

        assert_eq!(report.count, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.message, "Aucun paiement en retard détecté.");
    }

    #[tokio::test]
    async fn test_december_scenario_then_second_run() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());
        let row = candidate(12, 2025, TransactionStatus::Pending);
        let id = row.transaction_id;
        store.insert(row).await;

        let dispatcher = dispatcher(store.clone(), notifier.clone());

        let first = dispatcher.run(date(2025, 12, 10)).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.message, "1 relances envoyées avec succès.");
        assert!(store.reminder_sent(id).await);

        let second = dispatcher.run(date(2025, 12, 11)).await.unwrap();
        assert_eq!(second.count, 0);
        assert_eq!(notifier.sent_count(id).await, 1);

        store.reset(id).await;
        let third = dispatcher.run(date(2025, 12, 12)).await.unwrap();
        assert_eq!(third.count, 1);
        assert_eq!(notifier.sent_count(id).await, 2);
    }

    #[tokio::test]
    async fn test_grace_period() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());
        store.insert(candidate(12, 2025, TransactionStatus::Pending)).await;

        let dispatcher = dispatcher(store, notifier.clone());

        let early = dispatcher.run(date(2025, 12, 9)).await.unwrap();
        assert_eq!(early.count, 0);
        assert_eq!(early.skipped, 1);

        let due = dispatcher.run(date(2025, 12, 10)).await.unwrap();
        assert_eq!(due.count, 1);
    }

    #[tokio::test]
    async fn test_custom_grace_days() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());
        store.insert(candidate(12, 2025, TransactionStatus::Pending)).await;

        let report = dispatcher(store, notifier)
            .with_grace_days(0)
            .run(date(2025, 12, 5))
            .await
            .unwrap();
        assert_eq!(report.count, 1);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let store = Arc::new(MemoryStore::default());
        let failing = candidate(10, 2025, TransactionStatus::Late);
        let healthy = candidate(11, 2025, TransactionStatus::Late);
        let failing_id = failing.transaction_id;
        store.insert(failing).await;
        store.insert(healthy.clone()).await;

        let notifier = Arc::new(MockNotifier::new().failing_for(failing_id));
        let report = dispatcher(store.clone(), notifier.clone())
            .run(date(2026, 1, 15))
            .await
            .unwrap();

        assert_eq!(report.count, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with(&failing_id.to_string()));
        assert_eq!(notifier.sent_count(healthy.transaction_id).await, 1);

        // Claimed before the failed send, so not retried
        assert!(store.reminder_sent(failing_id).await);
    }

    #[tokio::test]
    async fn test_unreachable_tenant_is_not_claimed() {
        let store = Arc::new(MemoryStore::default());
        let mut row = candidate(11, 2025, TransactionStatus::Late);
        row.tenant_email = None;
        let id = row.transaction_id;
        store.insert(row).await;

        let notifier = Arc::new(MockNotifier::new().email_only());
        let report = dispatcher(store.clone(), notifier)
            .run(date(2026, 1, 15))
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(!store.reminder_sent(id).await);
    }

    #[tokio::test]
    async fn test_old_periods_are_out_of_scope() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());
        store.insert(candidate(6, 2023, TransactionStatus::Late)).await;

        let report = dispatcher(store, notifier)
            .run(date(2025, 12, 10))
            .await
            .unwrap();

        assert_eq!(report.scanned, 0);
    }

    #[tokio::test]
    async fn test_overlapping_runs_deliver_once() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(MockNotifier::new());
        let mut ids = Vec::new();
        for month in 1..=6 {
            let row = candidate(month, 2025, TransactionStatus::Late);
            ids.push(row.transaction_id);
            store.insert(row).await;
        }

        let first = dispatcher(store.clone(), notifier.clone());
        let second = dispatcher(store.clone(), notifier.clone());
        let today = date(2025, 12, 10);

        let (a, b) = tokio::join!(first.run(today), second.run(today));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.count + b.count, ids.len());
        for id in ids {
            assert_eq!(notifier.sent_count(id).await, 1);
        }
    }

    #[test]
    fn test_report_serialization_omits_empty_errors() {
        let report = DispatchReport::default().finish();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["count"], 0);
    }
}
