/// Monthly rent generation
///
/// Creates the rent record of a month for every active lease. Running it
/// twice for the same month is harmless: the `(lease, month, year)` unique
/// key turns the second insert into a skip.

use chrono::{Datelike, NaiveDate};
use rentdesk_shared::models::lease::Lease;
use rentdesk_shared::models::rental_transaction::{NewRentalTransaction, RentalTransaction};
use serde::Serialize;
use sqlx::PgPool;

/// Result of a generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub message: String,
    /// Active leases examined
    pub processed: usize,
    pub created: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "usize_is_zero")]
    pub failed: usize,
    /// `month/year`, e.g. `12/2025`
    pub period: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

fn usize_is_zero(n: &usize) -> bool {
    *n == 0
}

/// First and last day of the month containing `target`
pub fn period_bounds(target: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = target.with_day(1).unwrap_or(target);
    let next_month_start = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next_month_start
        .and_then(|d| d.pred_opt())
        .unwrap_or(start);

    (start, end)
}

/// Creates missing rent records for the month of `target`
///
/// A failed insert for one lease is reported and does not stop the others.
///
/// # Errors
///
/// Returns an error only if the active leases cannot be listed.
#[tracing::instrument(skip(pool))]
pub async fn generate_monthly_rentals(
    pool: &PgPool,
    target: NaiveDate,
) -> Result<GenerationReport, sqlx::Error> {
    let (period_start, period_end) = period_bounds(target);
    let period_month = target.month() as i16;
    let period_year = target.year();

    let leases = Lease::list_active(pool).await?;

    let mut created = 0;
    let mut skipped = 0;
    let mut errors = Vec::new();

    for lease in &leases {
        let data = NewRentalTransaction {
            lease_id: lease.id,
            period_month,
            period_year,
            period_start,
            period_end,
            amount_due: lease.monthly_amount,
        };

        match RentalTransaction::create_for_period(pool, data).await {
            Ok(Some(_)) => created += 1,
            Ok(None) => {
                tracing::debug!(lease_id = %lease.id, "Rent record already exists");
                skipped += 1;
            }
            Err(e) => {
                tracing::error!(lease_id = %lease.id, error = %e, "Failed to create rent record");
                errors.push(format!("{}: {e}", lease.id));
            }
        }
    }

    let message = if leases.is_empty() {
        "Aucun bail actif".to_string()
    } else if created == 0 && errors.is_empty() {
        "Toutes les échéances existent déjà".to_string()
    } else {
        format!("{created} échéances générées")
    };

    tracing::info!(
        period_month,
        period_year,
        processed = leases.len(),
        created,
        skipped,
        failed = errors.len(),
        "Monthly rent generation finished"
    );

    Ok(GenerationReport {
        message,
        processed: leases.len(),
        created,
        skipped,
        failed: errors.len(),
        period: format!("{period_month}/{period_year}"),
        period_start,
        period_end,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_bounds() {
        assert_eq!(period_bounds(date(2025, 12, 17)), (date(2025, 12, 1), date(2025, 12, 31)));
        assert_eq!(period_bounds(date(2026, 2, 1)), (date(2026, 2, 1), date(2026, 2, 28)));
        assert_eq!(period_bounds(date(2024, 2, 29)), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(period_bounds(date(2025, 4, 30)), (date(2025, 4, 1), date(2025, 4, 30)));
    }
}
