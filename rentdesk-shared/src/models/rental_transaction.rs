/// Rental transaction model
///
/// One row per lease per billing period. The reminder dispatcher reads the
/// unpaid rows and flips `reminder_sent` through [`RentalTransaction::claim_reminder`],
/// which is the only way a reminder is ever allowed to go out.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE rental_transactions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     lease_id UUID NOT NULL REFERENCES leases(id),
///     period_month SMALLINT NOT NULL CHECK (period_month BETWEEN 1 AND 12),
///     period_year INTEGER NOT NULL,
///     period_start DATE NOT NULL,
///     period_end DATE NOT NULL,
///     amount_due BIGINT NOT NULL,
///     status transaction_status NOT NULL DEFAULT 'pending',
///     reminder_sent BOOLEAN NOT NULL DEFAULT FALSE,
///     reminder_sent_at TIMESTAMPTZ,
///     paid_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (lease_id, period_month, period_year)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Late,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RentalTransaction {
    pub id: Uuid,
    pub lease_id: Uuid,
    pub period_month: i16,
    pub period_year: i32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount_due: i64,
    pub status: TransactionStatus,
    pub reminder_sent: bool,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRentalTransaction {
    pub lease_id: Uuid,
    pub period_month: i16,
    pub period_year: i32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount_due: i64,
}

/// An unpaid, unreminded transaction with everything needed to notify
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReminderCandidate {
    pub transaction_id: Uuid,
    pub lease_id: Uuid,
    pub team_id: Uuid,
    pub period_month: i16,
    pub period_year: i32,
    pub amount_due: i64,
    pub status: TransactionStatus,
    pub reminder_sent: bool,
    /// Lease billing day, falling back to the team default
    pub billing_day: Option<i16>,
    pub currency: String,
    pub tenant_name: String,
    pub tenant_email: Option<String>,
    pub tenant_push_token: Option<String>,
    pub owner_email: Option<String>,
}

const TRANSACTION_COLUMNS: &str = r#"
    id, lease_id, period_month, period_year, period_start, period_end, amount_due,
    status, reminder_sent, reminder_sent_at, paid_at, created_at, updated_at
"#;

impl RentalTransaction {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM rental_transactions WHERE id = $1");

        sqlx::query_as::<_, RentalTransaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a transaction, checking that its lease belongs to the team
    pub async fn find_in_team(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RentalTransaction>(
            r#"
            SELECT rt.id, rt.lease_id, rt.period_month, rt.period_year, rt.period_start,
                   rt.period_end, rt.amount_due, rt.status, rt.reminder_sent,
                   rt.reminder_sent_at, rt.paid_at, rt.created_at, rt.updated_at
            FROM rental_transactions rt
            JOIN leases l ON l.id = rt.lease_id
            WHERE l.team_id = $1 AND rt.id = $2
            "#,
        )
        .bind(team_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Inserts the transaction for a lease and period
    ///
    /// # Returns
    ///
    /// The new row, or `None` when the period already exists for the lease
    pub async fn create_for_period<'e>(
        executor: impl PgExecutor<'e>,
        data: NewRentalTransaction,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO rental_transactions
                (lease_id, period_month, period_year, period_start, period_end, amount_due)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (lease_id, period_month, period_year) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, RentalTransaction>(&query)
            .bind(data.lease_id)
            .bind(data.period_month)
            .bind(data.period_year)
            .bind(data.period_start)
            .bind(data.period_end)
            .bind(data.amount_due)
            .fetch_optional(executor)
            .await
    }

    /// Lists transactions eligible for a reminder
    ///
    /// Unpaid, not yet reminded, and in `min_year` or later. Ordering is
    /// oldest period first.
    pub async fn find_reminder_candidates(
        pool: &PgPool,
        min_year: i32,
    ) -> Result<Vec<ReminderCandidate>, sqlx::Error> {
        sqlx::query_as::<_, ReminderCandidate>(
            r#"
            SELECT
                rt.id AS transaction_id,
                rt.lease_id,
                l.team_id,
                rt.period_month,
                rt.period_year,
                rt.amount_due,
                rt.status,
                rt.reminder_sent,
                COALESCE(l.billing_day, t.default_billing_day) AS billing_day,
                t.currency,
                l.tenant_name,
                l.tenant_email,
                l.tenant_push_token,
                p.email AS owner_email
            FROM rental_transactions rt
            JOIN leases l ON l.id = rt.lease_id
            JOIN teams t ON t.id = l.team_id
            LEFT JOIN profiles p ON p.id = l.owner_id
            WHERE rt.status <> 'paid'
              AND rt.reminder_sent = FALSE
              AND rt.period_year >= $1
            ORDER BY rt.period_year ASC, rt.period_month ASC, rt.id ASC
            "#,
        )
        .bind(min_year)
        .fetch_all(pool)
        .await
    }

    /// Atomically claims the right to send a reminder
    ///
    /// Sets `reminder_sent` only if it is still false and the row is still
    /// unpaid. Exactly one concurrent caller gets `true`.
    pub async fn claim_reminder(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let claimed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE rental_transactions
            SET reminder_sent = TRUE, reminder_sent_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND reminder_sent = FALSE AND status <> 'paid'
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(claimed.is_some())
    }

    /// Clears the reminder flag on every unpaid transaction of a period
    ///
    /// # Returns
    ///
    /// The rows that were reset
    pub async fn reset_reminders(
        pool: &PgPool,
        month: i16,
        year: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE rental_transactions
            SET reminder_sent = FALSE, reminder_sent_at = NULL, updated_at = NOW()
            WHERE period_month = $1 AND period_year = $2 AND status <> 'paid'
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, RentalTransaction>(&query)
            .bind(month)
            .bind(year)
            .fetch_all(pool)
            .await
    }

    /// Records a payment
    ///
    /// # Returns
    ///
    /// The updated row, or `None` if it was already paid or cancelled
    pub async fn mark_paid(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE rental_transactions
            SET status = 'paid', paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'late')
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, RentalTransaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
